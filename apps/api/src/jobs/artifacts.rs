//! Scratch-directory storage for rendered documents.
//!
//! Files are written to a `tempfile` in the same directory and persisted
//! (renamed) into place, so a reader never sees a partial artifact. A write
//! that fails or is interrupted leaves nothing behind: the temporary file is
//! deleted when dropped. Paths are `{dir}/{job_id}.{ext}`, unique per job.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::models::job::{JobId, OutputFormat};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates the scratch directory if it does not exist yet.
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: JobId, format: OutputFormat) -> PathBuf {
        self.dir.join(format!("{job_id}.{}", format.extension()))
    }

    pub async fn write(
        &self,
        job_id: JobId,
        format: OutputFormat,
        bytes: Bytes,
    ) -> io::Result<PathBuf> {
        let path = self.path_for(job_id, format);
        let dir = self.dir.clone();
        let target = path.clone();
        let len = bytes.len();

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut file = tempfile::Builder::new()
                .prefix(".partial-")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)??;

        debug!("Wrote artifact {} ({len} bytes)", path.display());
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> io::Result<Bytes> {
        tokio::fs::read(path).await.map(Bytes::from)
    }

    /// Best-effort delete; a missing file is not an error.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed artifact {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {}: {e}", path.display()),
        }
    }
}
