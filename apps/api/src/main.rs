mod compose;
mod config;
mod errors;
mod jobs;
mod models;
mod render;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::jobs::artifacts::ArtifactStore;
use crate::jobs::sweeper::spawn_eviction_sweeper;
use crate::jobs::{JobOrchestrator, JobStore, OrchestratorSettings, RendererSet};
use crate::render::{ChromiumRenderer, MarkupRenderer};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (malformed env vars abort startup)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume render API v{}", env!("CARGO_PKG_VERSION"));

    // Artifact scratch directory
    let artifacts = ArtifactStore::open(config.artifact_dir.clone())
        .await
        .with_context(|| format!("creating artifact dir {}", config.artifact_dir.display()))?;
    info!("Artifacts stored under {}", artifacts.dir().display());

    // Headless browser for PDF output; HTML output needs no browser
    let mut chromium = ChromiumRenderer::new(&config.chrome_path);
    if config.chrome_no_sandbox {
        chromium = chromium.with_args(["--no-sandbox".to_string()]);
    }
    let pdf_renderer_available = chromium.is_available();
    if pdf_renderer_available {
        info!("PDF renderer: {}", config.chrome_path);
    } else {
        warn!(
            "Browser '{}' not found; PDF jobs will fail until CHROME_PATH is fixed",
            config.chrome_path
        );
    }

    let orchestrator = JobOrchestrator::new(
        JobStore::new(),
        artifacts,
        RendererSet {
            pdf: Arc::new(chromium),
            html: Arc::new(MarkupRenderer),
        },
        OrchestratorSettings {
            render_timeout: config.render_timeout,
            max_concurrent_renders: config.max_concurrent_renders,
            page_options: config.page_options(),
        },
    );
    info!(
        "Job orchestrator ready: {} render slots, {}s timeout",
        config.max_concurrent_renders,
        config.render_timeout.as_secs()
    );

    let sweeper_shutdown = CancellationToken::new();
    let sweeper = spawn_eviction_sweeper(
        orchestrator.clone(),
        config.eviction_interval,
        config.job_retention,
        sweeper_shutdown.clone(),
    );

    let state = AppState {
        config: config.clone(),
        orchestrator: orchestrator.clone(),
        pdf_renderer_available,
    };

    // Build router
    let app = build_router(state)
        .layer(RequestBodyLimitLayer::new(config.max_payload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    sweeper_shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Eviction sweeper ended abnormally: {e}");
    }
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
