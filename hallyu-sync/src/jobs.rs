//! Background sync jobs
//!
//! Each job runs one [`SyncRequest`] on a spawned task. At most one job per
//! [`SyncKind`] runs at a time; a second request for the same kind is a
//! conflict. Cancellation goes through the job's [`CancellationToken`].

use crate::services::{BatchReport, SyncRequest};
use crate::AppState;
use chrono::{DateTime, Utc};
use hallyu_common::{Error, MergeStrategy, Result, SyncKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Snapshot of a sync job
#[derive(Debug, Clone, Serialize)]
pub struct SyncJob {
    pub job_id: Uuid,
    pub kind: SyncKind,
    pub strategy: MergeStrategy,
    pub state: JobState,
    pub cancel_requested: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    cancel: CancellationToken,
    /// Position in finish order, 0 while running
    #[serde(skip)]
    finish_seq: u64,
}

/// Finished jobs kept for GET /sync/jobs; older ones are pruned
pub const DEFAULT_JOB_HISTORY: usize = 50;

/// In-memory registry of sync jobs
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, SyncJob>>>,
    history: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_history(DEFAULT_JOB_HISTORY)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry keeping at most `history` finished jobs
    pub fn with_history(history: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            history,
        }
    }

    /// Register a running job; conflict if one of the same kind is running
    pub async fn register(
        &self,
        kind: SyncKind,
        strategy: MergeStrategy,
    ) -> Result<(Uuid, CancellationToken)> {
        let mut jobs = self.jobs.write().await;

        if let Some(running) = jobs
            .values()
            .find(|job| job.kind == kind && job.state == JobState::Running)
        {
            return Err(Error::Conflict(format!(
                "{} sync already running (job {})",
                kind, running.job_id
            )));
        }

        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        jobs.insert(
            job_id,
            SyncJob {
                job_id,
                kind,
                strategy,
                state: JobState::Running,
                cancel_requested: false,
                started_at: Utc::now(),
                finished_at: None,
                report: None,
                error: None,
                cancel: cancel.clone(),
                finish_seq: 0,
            },
        );

        Ok((job_id, cancel))
    }

    /// Record the end of a job
    pub async fn finish(&self, job_id: Uuid, result: std::result::Result<BatchReport, String>) {
        let mut jobs = self.jobs.write().await;
        let finish_seq = jobs.values().map(|job| job.finish_seq).max().unwrap_or(0) + 1;
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };

        job.finished_at = Some(Utc::now());
        job.finish_seq = finish_seq;
        match result {
            Ok(report) => {
                job.state = if report.cancelled {
                    JobState::Cancelled
                } else {
                    JobState::Completed
                };
                job.report = Some(report);
            }
            Err(error) => {
                job.state = JobState::Failed;
                job.error = Some(error);
            }
        }

        prune_finished(&mut jobs, self.history);
    }

    /// Request cancellation of a running job
    pub async fn cancel(&self, job_id: Uuid) -> Result<SyncJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("Sync job not found: {}", job_id)))?;

        if job.state != JobState::Running {
            return Err(Error::Conflict(format!(
                "Sync job {} is no longer running",
                job_id
            )));
        }

        job.cancel.cancel();
        job.cancel_requested = true;
        tracing::info!(job_id = %job_id, kind = %job.kind, "Sync job cancellation requested");

        Ok(job.clone())
    }

    pub async fn get(&self, job_id: Uuid) -> Option<SyncJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// All jobs, newest first
    pub async fn list(&self) -> Vec<SyncJob> {
        let mut jobs: Vec<SyncJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// Cancel every running job
    pub async fn cancel_all(&self) {
        for job in self.jobs.write().await.values_mut() {
            if job.state == JobState::Running {
                job.cancel.cancel();
                job.cancel_requested = true;
            }
        }
    }
}

/// Drop the oldest finished jobs beyond `keep`; running jobs are never dropped
fn prune_finished(jobs: &mut HashMap<Uuid, SyncJob>, keep: usize) {
    let mut finished: Vec<(u64, Uuid)> = jobs
        .values()
        .filter(|job| job.finish_seq > 0)
        .map(|job| (job.finish_seq, job.job_id))
        .collect();
    if finished.len() <= keep {
        return;
    }

    finished.sort();
    let excess = finished.len() - keep;
    for (_, job_id) in finished.into_iter().take(excess) {
        jobs.remove(&job_id);
    }
    tracing::debug!(pruned = excess, "Pruned finished sync jobs");
}

/// Register and spawn a sync job
pub async fn spawn_sync_job(state: &AppState, request: SyncRequest) -> Result<Uuid> {
    let (job_id, cancel) = state.jobs.register(request.kind, request.strategy).await?;

    let state = state.clone();
    tokio::spawn(async move {
        tracing::info!(job_id = %job_id, kind = %request.kind, "Background sync task started");

        let result = state.orchestrator.run(job_id, &request, &cancel).await;

        if let Err(e) = &result {
            tracing::error!(job_id = %job_id, kind = %request.kind, error = %e, "Sync job failed");
            *state.last_error.write().await = Some(e.to_string());
        }

        state.jobs.finish(job_id, result.map_err(|e| e.to_string())).await;
    });

    Ok(job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_running_job_per_kind() {
        let registry = JobRegistry::new();

        let (first, _) = registry
            .register(SyncKind::Filmography, MergeStrategy::Merge)
            .await
            .unwrap();
        assert!(matches!(
            registry.register(SyncKind::Filmography, MergeStrategy::Merge).await,
            Err(Error::Conflict(_))
        ));
        registry
            .register(SyncKind::Cast, MergeStrategy::Merge)
            .await
            .unwrap();

        registry
            .finish(first, Ok(BatchReport::empty(SyncKind::Filmography)))
            .await;
        registry
            .register(SyncKind::Filmography, MergeStrategy::Incremental)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_marks_token_and_state_follows_report() {
        let registry = JobRegistry::new();
        let (job_id, token) = registry
            .register(SyncKind::Discography, MergeStrategy::Merge)
            .await
            .unwrap();

        let snapshot = registry.cancel(job_id).await.unwrap();
        assert!(snapshot.cancel_requested);
        assert!(token.is_cancelled());

        let mut report = BatchReport::empty(SyncKind::Discography);
        report.cancelled = true;
        registry.finish(job_id, Ok(report)).await;

        let job = registry.get(job_id).await.unwrap();
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.finished_at.is_some());
        assert!(matches!(registry.cancel(job_id).await, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_finished_history_is_capped() {
        let registry = JobRegistry::with_history(2);
        let mut finished = Vec::new();

        for _ in 0..4 {
            let (job_id, _) = registry
                .register(SyncKind::Cast, MergeStrategy::Merge)
                .await
                .unwrap();
            registry.finish(job_id, Ok(BatchReport::empty(SyncKind::Cast))).await;
            finished.push(job_id);
        }
        let (running, _) = registry
            .register(SyncKind::Filmography, MergeStrategy::Merge)
            .await
            .unwrap();

        let jobs = registry.list().await;
        assert_eq!(jobs.len(), 3);
        assert!(registry.get(running).await.is_some());
        assert!(registry.get(finished[0]).await.is_none());
        assert!(registry.get(finished[1]).await.is_none());
        assert!(registry.get(finished[3]).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_keeps_error() {
        let registry = JobRegistry::new();
        let (job_id, _) = registry
            .register(SyncKind::SocialLinks, MergeStrategy::ReplaceAll)
            .await
            .unwrap();

        registry.finish(job_id, Err("database is locked".to_string())).await;

        let job = registry.get(job_id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("database is locked"));
        assert!(matches!(registry.cancel(Uuid::new_v4()).await, Err(Error::NotFound(_))));
    }
}
