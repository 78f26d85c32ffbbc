// Document generation pipeline: job store, artifact scratch storage, the
// orchestrator that drives renders, and the HTTP handlers in front of it.

pub mod artifacts;
pub mod handlers;
pub mod orchestrator;
pub mod store;
pub mod sweeper;

pub use orchestrator::{JobOrchestrator, OrchestratorSettings, RendererSet};
pub use store::JobStore;
