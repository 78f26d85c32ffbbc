use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::jobs::orchestrator::MAX_BATCH_SIZE;
use crate::models::job::OutputFormat;
use crate::state::AppState;

/// GET /health
/// Service status, rendering capabilities and current job counts.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let orchestrator = &state.orchestrator;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "features": {
            "pdfRendering": state.pdf_renderer_available,
            "pdfBackend": orchestrator.renderer_name(OutputFormat::Pdf),
            "htmlOutput": true,
            "maxBatchSize": MAX_BATCH_SIZE,
            "maxConcurrentRenders": state.config.max_concurrent_renders,
            "idleRenderSlots": orchestrator.idle_render_slots(),
        },
        "jobs": orchestrator.store().counts(),
    }))
}
