use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque job identifier, a random v4 UUID allocated at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Html,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Html => "text/html; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
        }
    }
}

/// Invalid payloads are rejected at submit time and never reach the store,
/// so there is no validation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Render,
    Timeout,
    Cancelled,
    Internal,
}

/// Why a job ended in `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Job was cancelled before rendering finished")
    }
}

/// Lifecycle state. Artifact path and error live inside the variants, so a
/// completed job always has a path and a failed job always has an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    Processing,
    #[serde(rename_all = "camelCase")]
    Completed { artifact_path: String },
    Failed { error: JobFailure },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub template: String,
    pub theme: String,
    pub format: OutputFormat,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One unit of asynchronous rendering work, as stored in the job store and
/// returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub job_id: JobId,
    #[serde(flatten)]
    pub state: JobState,
    pub metadata: JobMetadata,
}

impl GenerationJob {
    pub fn processing(job_id: JobId, template: &str, theme: &str, format: OutputFormat) -> Self {
        Self {
            job_id,
            state: JobState::Processing,
            metadata: JobMetadata {
                template: template.to_string(),
                theme: theme.to_string(),
                format,
                created_at: Utc::now(),
                completed_at: None,
            },
        }
    }

    pub fn artifact_path(&self) -> Option<&str> {
        match &self.state {
            JobState::Completed { artifact_path } => Some(artifact_path),
            _ => None,
        }
    }
}
