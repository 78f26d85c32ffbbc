use crate::config::Config;
use crate::jobs::JobOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: JobOrchestrator,
    /// Whether the configured browser binary was found at startup.
    pub pdf_renderer_available: bool,
}
