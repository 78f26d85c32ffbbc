pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::jobs::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/templates", get(handlers::handle_list_templates))
        // Generation API
        .route("/generate", post(handlers::handle_generate))
        .route("/batch-generate", post(handlers::handle_batch_generate))
        // Query / download API
        .route(
            "/job/:job_id",
            get(handlers::handle_get_job).delete(handlers::handle_cancel_job),
        )
        .route("/download/:job_id", get(handlers::handle_download))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::compose::Markup;
    use crate::config::Config;
    use crate::jobs::artifacts::ArtifactStore;
    use crate::jobs::{JobOrchestrator, JobStore, OrchestratorSettings, RendererSet};
    use crate::render::{MarkupRenderer, PageOptions, PageSize, RenderError, Renderer};

    struct FakePdf {
        delay: Duration,
    }

    #[async_trait]
    impl Renderer for FakePdf {
        fn name(&self) -> &'static str {
            "fake-pdf"
        }

        async fn render(&self, _: &Markup, _: &PageOptions) -> Result<Bytes, RenderError> {
            tokio::time::sleep(self.delay).await;
            Ok(Bytes::from_static(b"%PDF-1.7\n%fake\n"))
        }
    }

    fn test_config(artifact_dir: PathBuf) -> Config {
        Config {
            port: 0,
            rust_log: "info".to_string(),
            artifact_dir,
            chrome_path: "chromium".to_string(),
            chrome_no_sandbox: false,
            render_timeout: Duration::from_secs(5),
            max_concurrent_renders: 2,
            job_retention: Duration::from_secs(3600),
            eviction_interval: Duration::from_secs(300),
            max_payload_bytes: 1024 * 1024,
            page_size: PageSize::A4,
            page_margin_mm: 10.0,
            print_background: true,
        }
    }

    async fn test_app(render_delay: Duration) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        let artifacts = ArtifactStore::open(dir.path()).await.unwrap();
        let orchestrator = JobOrchestrator::new(
            JobStore::new(),
            artifacts,
            RendererSet {
                pdf: Arc::new(FakePdf { delay: render_delay }),
                html: Arc::new(MarkupRenderer),
            },
            OrchestratorSettings {
                render_timeout: config.render_timeout,
                max_concurrent_renders: config.max_concurrent_renders,
                page_options: config.page_options(),
            },
        );
        let state = AppState {
            config,
            orchestrator,
            pdf_renderer_available: true,
        };
        (build_router(state), dir)
    }

    fn ada() -> Value {
        json!({
            "personalInfo": {
                "fullName": "Ada Lovelace",
                "email": "ada@example.com",
                "title": "Analyst"
            },
            "experience": [{
                "position": "Analyst",
                "company": "Analytical Engine Co",
                "startDate": "1842-01",
                "current": true,
                "description": "Wrote the first published algorithm."
            }],
            "skills": [{"name": "Mathematics"}]
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes)
    }

    fn json_of(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, Method::GET, &format!("/job/{job_id}"), None).await;
            assert_eq!(status, StatusCode::OK);
            let job = json_of(&body);
            if job["status"] != "processing" {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never left processing");
    }

    #[tokio::test]
    async fn test_generate_then_download_pdf() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let mut body = ada();
        body["template"] = json!("modern");
        body["theme"] = json!("blue");
        let (status, bytes) = send(&app, Method::POST, "/generate", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let accepted = json_of(&bytes);
        assert_eq!(accepted["status"], "processing");
        let job_id = accepted["jobId"].as_str().unwrap().to_string();

        let job = wait_for_terminal(&app, &job_id).await;
        assert_eq!(job["status"], "completed");
        assert_eq!(job["metadata"]["template"], "modern");
        assert_eq!(job["metadata"]["theme"], "blue");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/download/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains(&format!("resume-{job_id}.pdf")));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_html_format_returns_markup() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let mut body = ada();
        body["template"] = json!("classic");
        let (status, bytes) = send(&app, Method::POST, "/generate?format=html", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = json_of(&bytes)["jobId"].as_str().unwrap().to_string();

        let job = wait_for_terminal(&app, &job_id).await;
        assert_eq!(job["status"], "completed");
        assert_eq!(job["metadata"]["theme"], "navy");

        let (status, bytes) = send(&app, Method::GET, &format!("/download/{job_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_missing_email_is_rejected_without_a_job() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let body = json!({
            "personalInfo": {"fullName": "Ada Lovelace"},
            "template": "modern"
        });
        let (status, bytes) = send(&app, Method::POST, "/generate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&bytes)["error"]["code"], "VALIDATION_ERROR");

        let (_, bytes) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(json_of(&bytes)["jobs"]["processing"], 0);
    }

    #[tokio::test]
    async fn test_theme_outside_template_is_rejected() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let mut body = ada();
        body["template"] = json!("classic");
        body["theme"] = json!("neon");
        let (status, _) = send(&app, Method::POST, "/generate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut body = ada();
        body["template"] = json!("baroque");
        let (status, _) = send(&app, Method::POST, "/generate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_and_query_use_error_envelope() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let mut body = ada();
        body["template"] = json!("modern");
        body["experience"][0]["current"] = json!("yes");
        let (status, bytes) = send(&app, Method::POST, "/generate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&bytes)["error"]["code"], "VALIDATION_ERROR");

        let mut body = ada();
        body["template"] = json!("modern");
        let (status, bytes) = send(&app, Method::POST, "/generate?format=docx", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&bytes)["error"]["code"], "VALIDATION_ERROR");

        let (_, bytes) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(json_of(&bytes)["jobs"]["processing"], 0);
    }

    #[tokio::test]
    async fn test_batch_size_limits() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let empty = json!({"payloads": [], "template": "minimal"});
        let (status, _) = send(&app, Method::POST, "/batch-generate", Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let eleven: Vec<Value> = (0..11).map(|_| ada()).collect();
        let too_many = json!({"payloads": eleven, "template": "minimal"});
        let (status, _) = send(&app, Method::POST, "/batch-generate", Some(too_many)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let three: Vec<Value> = (0..3).map(|_| ada()).collect();
        let ok = json!({"payloads": three, "template": "minimal", "theme": "blue"});
        let (status, bytes) = send(&app, Method::POST, "/batch-generate", Some(ok)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let batch = json_of(&bytes);
        assert!(batch["batchId"].is_string());
        let ids = batch["jobIds"].as_array().unwrap();
        assert_eq!(ids.len(), 3);
        for id in ids {
            let job = wait_for_terminal(&app, id.as_str().unwrap()).await;
            assert_eq!(job["status"], "completed");
        }
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, Method::GET, &format!("/job/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::GET, &format!("/download/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::GET, "/job/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_while_processing_conflicts_and_cancel_fails_job() {
        let (app, _dir) = test_app(Duration::from_secs(30)).await;

        let mut body = ada();
        body["template"] = json!("professional");
        let (_, bytes) = send(&app, Method::POST, "/generate", Some(body)).await;
        let job_id = json_of(&bytes)["jobId"].as_str().unwrap().to_string();

        let (status, bytes) = send(&app, Method::GET, &format!("/download/{job_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&bytes)["error"]["code"], "PRECONDITION_FAILED");

        let (status, bytes) = send(&app, Method::DELETE, &format!("/job/{job_id}"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job = json_of(&bytes);
        assert_eq!(job["status"], "failed");
        assert_eq!(job["error"]["kind"], "cancelled");

        let (status, _) = send(&app, Method::DELETE, &format!("/job/{job_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, Method::GET, &format!("/download/{job_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_templates_catalog() {
        let (app, _dir) = test_app(Duration::ZERO).await;

        let (status, bytes) = send(&app, Method::GET, "/templates", None).await;
        assert_eq!(status, StatusCode::OK);
        let catalog = json_of(&bytes);
        let templates = catalog["templates"].as_array().unwrap();
        assert_eq!(templates.len(), 5);
        let classic = templates.iter().find(|t| t["name"] == "classic").unwrap();
        assert_eq!(classic["defaultTheme"], "navy");
        assert_eq!(classic["archetype"], "centered");
    }
}
