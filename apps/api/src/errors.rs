use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jobs::orchestrator::SubmitError;
use crate::jobs::store::TransitionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The job exists but is not in a state that allows the request.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::ShuttingDown => AppError::ServiceUnavailable(e.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Malformed bodies get the same envelope as payload validation failures.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotFound(_) => AppError::NotFound(e.to_string()),
            TransitionError::AlreadyTerminal { .. } => AppError::PreconditionFailed(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PreconditionFailed(msg) => {
                (StatusCode::CONFLICT, "PRECONDITION_FAILED", msg.clone())
            }
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobId;
    use crate::models::payload::PayloadError;

    #[test]
    fn test_submit_errors_are_client_errors() {
        let err: AppError = SubmitError::Payload(PayloadError::MissingField("email")).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err: AppError = SubmitError::ShuttingDown.into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_transition_errors_map_to_404_and_409() {
        let id = JobId::new();
        let err: AppError = TransitionError::NotFound(id).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err: AppError = TransitionError::AlreadyTerminal {
            job_id: id,
            state: "completed",
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("disk on fire"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
