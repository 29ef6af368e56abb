//! Sync orchestration
//!
//! Every sync follows the same shape per entity:
//!
//! 1. Fetch from the external source, retried with backoff
//! 2. In one transaction (retried on lock errors): load the stored rows,
//!    reconcile them against the fetched items with the chosen
//!    [`MergeStrategy`], apply the plan, stamp `*_synced_at`
//!
//! [`SyncOrchestrator::run`] selects entities and drives them through
//! [`run_batch`], publishing progress on the event bus.

mod cast;
mod discography;
mod filmography;
mod social_links;

use crate::db::artists::{select_for_sync, SyncTarget};
use crate::services::batch_runner::{run_batch, BatchReport, SyncOutcome};
use crate::services::sources::{SourceError, Sources};
use crate::utils::RetryPolicy;
use chrono::Utc;
use hallyu_common::config::SyncConfig;
use hallyu_common::events::{EventBus, HallyuEvent};
use hallyu_common::{MergeStrategy, SyncKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Failure syncing a single entity
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] hallyu_common::Error),

    #[error("Invalid sync target: {0}")]
    InvalidTarget(String),
}

/// Parameters of one sync batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub kind: SyncKind,
    pub strategy: MergeStrategy,
    /// Maximum number of entities to process
    pub limit: usize,
    pub concurrency: usize,
    /// Restrict the batch to these entity ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

impl SyncRequest {
    /// Request using the configured strategy, batch limit and concurrency
    pub fn with_defaults(kind: SyncKind, config: &SyncConfig) -> Self {
        Self {
            kind,
            strategy: config.default_strategy,
            limit: config.batch_limit,
            concurrency: config.concurrency,
            ids: None,
        }
    }
}

/// Runs sync batches against the catalog database
pub struct SyncOrchestrator {
    db: SqlitePool,
    sources: Sources,
    retry: RetryPolicy,
    event_bus: EventBus,
}

impl SyncOrchestrator {
    pub fn new(db: SqlitePool, sources: Sources, retry: RetryPolicy, event_bus: EventBus) -> Self {
        Self {
            db,
            sources,
            retry,
            event_bus,
        }
    }

    /// Sync a single entity
    pub async fn sync_target(
        &self,
        kind: SyncKind,
        target: &SyncTarget,
        strategy: MergeStrategy,
    ) -> Result<SyncOutcome, SyncError> {
        let outcome = match kind {
            SyncKind::Filmography => filmography::sync(self, target, strategy).await?,
            SyncKind::Discography => discography::sync(self, target, strategy).await?,
            SyncKind::SocialLinks => social_links::sync(self, target, strategy).await?,
            SyncKind::Cast => cast::sync(self, target, strategy).await?,
        };

        tracing::debug!(
            kind = %kind,
            entity_id = %target.id,
            label = %target.label,
            added = outcome.added,
            updated = outcome.updated,
            removed = outcome.removed,
            unchanged = outcome.unchanged,
            skipped = outcome.skipped,
            "Entity synced"
        );

        Ok(outcome)
    }

    /// Select entities for `request` and sync them as one batch
    pub async fn run(
        &self,
        job_id: Uuid,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> hallyu_common::Result<BatchReport> {
        let kind = request.kind;
        let strategy = request.strategy;

        let targets =
            select_for_sync(&self.db, kind, request.limit, request.ids.as_deref()).await?;
        let total = targets.len();

        tracing::info!(
            job_id = %job_id,
            kind = %kind,
            strategy = %strategy,
            total,
            concurrency = request.concurrency,
            "Starting sync batch"
        );

        self.event_bus.emit_lossy(HallyuEvent::SyncStarted {
            job_id,
            kind,
            strategy,
            total,
            timestamp: Utc::now(),
        });

        let report = run_batch(
            kind,
            targets,
            request.concurrency,
            cancel,
            |progress| {
                self.event_bus.emit_lossy(HallyuEvent::SyncProgress {
                    job_id,
                    kind,
                    entity_id: progress.entity_id.clone(),
                    completed: progress.completed,
                    total: progress.total,
                    success: progress.success,
                    error: progress.error.clone(),
                    timestamp: Utc::now(),
                });
            },
            |target: SyncTarget| async move { self.sync_target(kind, &target, strategy).await },
        )
        .await;

        self.event_bus.emit_lossy(HallyuEvent::SyncCompleted {
            job_id,
            kind,
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
            cancelled: report.cancelled,
            duration_ms: report.duration_ms,
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub(crate) fn sources(&self) -> &Sources {
        &self.sources
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
