//! Axum route handlers for the generation, query and download API.

use std::path::Path as FsPath;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::jobs::orchestrator::{BatchSubmission, GenerationRequest};
use crate::models::job::{GenerationJob, JobId, JobState, OutputFormat};
use crate::models::payload::DocumentPayload;
use crate::templates::{list_templates, LayoutArchetype};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Extractors
// ────────────────────────────────────────────────────────────────────────────

/// `Json` whose rejections (bad JSON, wrong types, wrong content type) are
/// reported as `VALIDATION_ERROR` in the usual error envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` with the same rejection mapping as `AppJson`.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Body of `POST /generate`: the payload fields at the top level plus the
/// template/theme selection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(flatten)]
    pub payload: DocumentPayload,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    #[serde(default)]
    pub payloads: Vec<DocumentPayload>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub submission: BatchSubmission,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub name: &'static str,
    pub description: &'static str,
    pub archetype: LayoutArchetype,
    pub themes: &'static [&'static str],
    pub default_theme: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TemplateCatalog {
    pub templates: Vec<TemplateView>,
}

fn parse_job_id(raw: &str) -> Result<JobId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Job {raw} not found")))
}

fn selected_theme(theme: Option<String>) -> Option<String> {
    theme.filter(|t| !t.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate?format={pdf|html}
///
/// Validates synchronously, then returns 202 with the new job id while the
/// render runs in the background.
pub async fn handle_generate(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FormatQuery>,
    AppJson(body): AppJson<GenerateBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let job_id = state.orchestrator.submit(GenerationRequest {
        payload: body.payload,
        template: body.template,
        theme: selected_theme(body.theme),
        format: query.format,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: "processing",
        }),
    ))
}

/// POST /batch-generate?format={pdf|html}
pub async fn handle_batch_generate(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FormatQuery>,
    AppJson(body): AppJson<BatchBody>,
) -> Result<(StatusCode, Json<BatchResponse>), AppError> {
    let theme = selected_theme(body.theme);
    let submission = state.orchestrator.submit_batch(
        body.payloads,
        &body.template,
        theme.as_deref(),
        query.format,
    )?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            submission,
            status: "processing",
        }),
    ))
}

/// GET /job/:job_id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<GenerationJob>, AppError> {
    let job_id = parse_job_id(&raw_id)?;
    state
        .orchestrator
        .get_status(&job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

/// DELETE /job/:job_id
///
/// Cancels a processing job. Terminal jobs are left untouched (409).
pub async fn handle_cancel_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<(StatusCode, Json<GenerationJob>), AppError> {
    let job_id = parse_job_id(&raw_id)?;
    let job = state.orchestrator.cancel(&job_id)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /download/:job_id
///
/// Serves a finished artifact. Never renders; a job that is still processing
/// or has failed gets 409.
pub async fn handle_download(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let job_id = parse_job_id(&raw_id)?;
    let job = state
        .orchestrator
        .get_status(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    let artifact_path = match job.state {
        JobState::Completed { artifact_path } => artifact_path,
        JobState::Processing => {
            return Err(AppError::PreconditionFailed(format!(
                "Job {job_id} is still processing"
            )))
        }
        JobState::Failed { error } => {
            return Err(AppError::PreconditionFailed(format!(
                "Job {job_id} failed: {}",
                error.message
            )))
        }
    };

    let bytes = match state
        .orchestrator
        .artifacts()
        .read(FsPath::new(&artifact_path))
        .await
    {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!(
                "Artifact for job {job_id} is no longer available"
            )))
        }
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    let format = job.metadata.format;
    let disposition = format!(
        "attachment; filename=\"resume-{job_id}.{}\"",
        format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /templates
pub async fn handle_list_templates() -> Json<TemplateCatalog> {
    let templates = list_templates()
        .iter()
        .map(|t| TemplateView {
            name: t.name,
            description: t.description,
            archetype: t.archetype,
            themes: t.themes,
            default_theme: t.default_theme(),
        })
        .collect();
    Json(TemplateCatalog { templates })
}
