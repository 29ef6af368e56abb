//! Periodic sync scheduling
//!
//! When `sync.schedule_interval_secs` is set, `serve` starts every sync kind
//! once per interval with the configured defaults. A kind whose previous job
//! is still running is skipped for that tick.

use crate::jobs::spawn_sync_job;
use crate::services::SyncRequest;
use crate::AppState;
use hallyu_common::{Error, SyncKind};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Spawn the scheduler loop; it exits when `shutdown` is cancelled
pub fn spawn_scheduler(
    state: AppState,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Sync scheduler started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately; the first run waits one interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => schedule_all(&state).await,
            }
        }

        tracing::info!("Sync scheduler stopped");
    })
}

/// Start one job per sync kind
pub async fn schedule_all(state: &AppState) {
    for kind in SyncKind::ALL {
        let request = SyncRequest::with_defaults(kind, &state.config.sync);
        match spawn_sync_job(state, request).await {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, kind = %kind, "Scheduled sync started");
            }
            Err(Error::Conflict(msg)) => {
                tracing::debug!(kind = %kind, "Scheduled sync skipped: {}", msg);
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Scheduled sync failed to start");
            }
        }
    }
}
