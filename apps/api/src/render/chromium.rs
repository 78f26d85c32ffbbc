//! Headless Chromium backend.
//!
//! Each render gets its own scratch directory (markup, output, browser profile,
//! stderr log) and its own browser process, started as the leader of a new
//! process group. Both live in a `BrowserSession`; dropping the session kills
//! the whole group (renderer, GPU and zygote helpers included) and deletes the
//! directory, so a timeout or cancellation that drops the render future cannot
//! leak a browser.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::compose::Markup;
use crate::render::{PageOptions, RenderError, Renderer};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Tail of the browser's stderr kept in `BrowserExited` errors.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: PathBuf,
    /// Placed before the standard flags (e.g. `--no-sandbox`).
    extra_args: Vec<String>,
}

impl ChromiumRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// True if the configured binary is an executable path or found on `PATH`.
    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn command_args(&self, input: &Path, output: &Path, profile: &Path) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend(
            [
                "--headless",
                "--disable-gpu",
                "--disable-extensions",
                "--disable-background-networking",
                "--no-first-run",
                "--no-default-browser-check",
                "--hide-scrollbars",
                "--mute-audio",
                "--no-pdf-header-footer",
                "--run-all-compositor-stages-before-draw",
            ]
            .map(String::from),
        );
        args.push(format!("--user-data-dir={}", profile.display()));
        args.push(format!("--print-to-pdf={}", output.display()));
        args.push(format!("file://{}", input.display()));
        args
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn render(&self, markup: &Markup, options: &PageOptions) -> Result<Bytes, RenderError> {
        let workdir = tempfile::Builder::new()
            .prefix("resume-render-")
            .tempdir()?;
        let input = workdir.path().join("document.html");
        let output = workdir.path().join("document.pdf");
        let profile = workdir.path().join("profile");
        let stderr_log = workdir.path().join("browser.log");

        let styled = markup.with_head_style(&options.print_css());
        tokio::fs::write(&input, styled.as_str()).await?;

        let args = self.command_args(&input, &output, &profile);
        let mut session = BrowserSession::launch(&self.binary, &args, &stderr_log, workdir)?;
        let status = session.wait().await?;

        if !status.success() {
            let stderr = read_tail(&stderr_log).await;
            warn!("Browser exited with {status}");
            return Err(RenderError::BrowserExited {
                status: status.to_string(),
                stderr,
            });
        }

        let bytes = match tokio::fs::read(&output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::MissingOutput)
            }
            Err(e) => return Err(RenderError::Io(e)),
        };

        if !bytes.starts_with(PDF_MAGIC) {
            return Err(RenderError::InvalidOutput);
        }

        debug!("Browser produced {} PDF bytes", bytes.len());
        Ok(Bytes::from(bytes))
    }
}

/// A running browser process plus the scratch directory it works in.
struct BrowserSession {
    child: Child,
    /// Process group led by the browser; equal to its pid.
    pgid: Option<u32>,
    // Dropped after `child`, so the directory outlives the process.
    _workdir: TempDir,
}

impl BrowserSession {
    fn launch(
        binary: &Path,
        args: &[String],
        stderr_log: &Path,
        workdir: TempDir,
    ) -> Result<Self, RenderError> {
        let stderr = std::fs::File::create(stderr_log)?;
        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|source| RenderError::Launch {
                binary: binary.display().to_string(),
                source,
            })?;

        debug!("Launched browser pid={:?}", child.id());
        Ok(Self {
            pgid: child.id(),
            child,
            _workdir: workdir,
        })
    }

    async fn wait(&mut self) -> Result<ExitStatus, RenderError> {
        Ok(self.child.wait().await?)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Still running means the render future was dropped mid-flight.
        if let Ok(None) = self.child.try_wait() {
            warn!("Killing browser pid={:?} abandoned mid-render", self.child.id());
            let _ = self.child.start_kill();
        }
        // Helpers forked by the browser outlive it unless the group goes too.
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            // SAFETY: plain syscall on a group we created; ESRCH when it is
            // already empty is ignored.
            unsafe {
                libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
}

async fn read_tail(path: &Path) -> String {
    let log = tokio::fs::read(path).await.unwrap_or_default();
    let start = log.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&log[start..]).trim().to_string()
}
