use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::render::{Margins, PageOptions, PageSize};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Scratch directory for rendered artifacts.
    pub artifact_dir: PathBuf,
    /// Chromium/Chrome binary, as a path or a name looked up on PATH.
    pub chrome_path: String,
    /// Adds `--no-sandbox`; needed when running as root in containers.
    pub chrome_no_sandbox: bool,
    pub render_timeout: Duration,
    pub max_concurrent_renders: usize,
    pub job_retention: Duration,
    pub eviction_interval: Duration,
    pub max_payload_bytes: usize,
    pub page_size: PageSize,
    pub page_margin_mm: f32,
    pub print_background: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            artifact_dir: PathBuf::from(
                std::env::var("ARTIFACT_DIR").unwrap_or_else(|_| "./generated".to_string()),
            ),
            chrome_path: std::env::var("CHROME_PATH").unwrap_or_else(|_| "chromium".to_string()),
            chrome_no_sandbox: env_or("CHROME_NO_SANDBOX", false)?,
            render_timeout: Duration::from_secs(env_or("RENDER_TIMEOUT_SECS", 60)?),
            max_concurrent_renders: env_or("MAX_CONCURRENT_RENDERS", 4)?,
            job_retention: Duration::from_secs(env_or("JOB_RETENTION_SECS", 3600)?),
            eviction_interval: Duration::from_secs(env_or("EVICTION_INTERVAL_SECS", 300)?),
            max_payload_bytes: env_or("MAX_PAYLOAD_BYTES", 2 * 1024 * 1024)?,
            page_size: env_or("DEFAULT_PAGE_SIZE", PageSize::A4)?,
            page_margin_mm: env_or("PAGE_MARGIN_MM", 10.0)?,
            print_background: env_or("PRINT_BACKGROUND", true)?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.max_concurrent_renders == 0 {
            return Err(anyhow!("MAX_CONCURRENT_RENDERS must be at least 1"));
        }
        if self.render_timeout.is_zero() {
            return Err(anyhow!("RENDER_TIMEOUT_SECS must be at least 1"));
        }
        if self.eviction_interval.is_zero() {
            return Err(anyhow!("EVICTION_INTERVAL_SECS must be at least 1"));
        }
        if !(0.0..=50.0).contains(&self.page_margin_mm) {
            return Err(anyhow!("PAGE_MARGIN_MM must be between 0 and 50"));
        }
        Ok(())
    }

    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            page_size: self.page_size,
            margins: Margins::uniform(self.page_margin_mm),
            print_background: self.print_background,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("{key} has an invalid value '{value}'")),
    }
}
