use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::jobs::JobOrchestrator;

/// Periodically evicts terminal jobs older than `retention` (records and
/// artifact files) until `shutdown` fires.
pub fn spawn_eviction_sweeper(
    orchestrator: JobOrchestrator,
    interval: Duration,
    retention: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Eviction sweeper started: every {}s, retention {}s",
            interval.as_secs(),
            retention.as_secs()
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    orchestrator.evict_expired(retention).await;
                }
            }
        }
        info!("Eviction sweeper stopped");
    })
}
