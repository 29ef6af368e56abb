//! Bounded-concurrency batch execution
//!
//! Runs one async operation per item with at most `concurrency` in flight
//! (`futures::stream::buffer_unordered`). Failures are isolated per item and
//! aggregated into a [`BatchReport`]. Cancelling the token stops new items from
//! being scheduled; items already in flight run to completion.

use crate::db::artists::SyncTarget;
use futures::stream::{self, StreamExt};
use hallyu_common::SyncKind;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-entity result of a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub entity_id: String,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Fetched items that could not be stored
    pub skipped: usize,
}

impl SyncOutcome {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub entity_id: String,
    pub error: String,
}

/// Aggregate result of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub kind: SyncKind,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
    /// True when cancellation left items unprocessed
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn empty(kind: SyncKind) -> Self {
        Self {
            kind,
            total: 0,
            succeeded: 0,
            failed: 0,
            added: 0,
            updated: 0,
            removed: 0,
            skipped: 0,
            failures: Vec::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    fn record_success(&mut self, outcome: &SyncOutcome) {
        self.succeeded += 1;
        self.added += outcome.added;
        self.updated += outcome.updated;
        self.removed += outcome.removed;
        self.skipped += outcome.skipped;
    }

    fn record_failure(&mut self, entity_id: String, error: String) {
        self.failed += 1;
        self.failures.push(BatchFailure { entity_id, error });
    }

    /// Items finished, successfully or not
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Progress notification after each finished item
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub entity_id: String,
    pub completed: usize,
    pub total: usize,
    pub success: bool,
    pub error: Option<String>,
}

/// Item identified by an entity id in reports
pub trait BatchItem {
    fn entity_id(&self) -> &str;
}

impl BatchItem for SyncTarget {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl BatchItem for String {
    fn entity_id(&self) -> &str {
        self
    }
}

/// Process `items` with bounded concurrency
///
/// `on_progress` is called once per finished item, in completion order.
pub async fn run_batch<I, F, Fut, E, P>(
    kind: SyncKind,
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    mut on_progress: P,
    process: F,
) -> BatchReport
where
    I: BatchItem,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<SyncOutcome, E>>,
    E: Display,
    P: FnMut(&BatchProgress),
{
    let start = Instant::now();
    let total = items.len();
    let mut report = BatchReport::empty(kind);
    report.total = total;

    let results = stream::iter(items)
        .take_until(cancel.cancelled())
        .map(|item| {
            let entity_id = item.entity_id().to_string();
            let work = process(item);
            async move { (entity_id, work.await) }
        })
        .buffer_unordered(concurrency.max(1));
    futures::pin_mut!(results);

    while let Some((entity_id, result)) = results.next().await {
        let (success, error) = match result {
            Ok(outcome) => {
                report.record_success(&outcome);
                (true, None)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    kind = %kind,
                    entity_id = %entity_id,
                    error = %message,
                    "Sync item failed"
                );
                report.record_failure(entity_id.clone(), message.clone());
                (false, Some(message))
            }
        };

        on_progress(&BatchProgress {
            entity_id,
            completed: report.processed(),
            total,
            success,
            error,
        });
    }

    report.cancelled = cancel.is_cancelled() && report.processed() < total;
    report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    tracing::info!(
        kind = %kind,
        total,
        succeeded = report.succeeded,
        failed = report.failed,
        cancelled = report.cancelled,
        duration_ms = report.duration_ms,
        "Batch finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_counted() {
        let cancel = CancellationToken::new();
        let mut progress_calls = 0;

        let report = run_batch(
            SyncKind::Filmography,
            ids(5),
            2,
            &cancel,
            |_| progress_calls += 1,
            |id: String| async move {
                if id == "item-3" {
                    Err("upstream 502".to_string())
                } else {
                    Ok(SyncOutcome {
                        added: 2,
                        skipped: 1,
                        ..SyncOutcome::new(id)
                    })
                }
            },
        )
        .await;

        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.added, 8);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.failures[0].entity_id, "item-3");
        assert_eq!(report.failures[0].error, "upstream 502");
        assert!(!report.cancelled);
        assert_eq!(progress_calls, 5);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = run_batch(
            SyncKind::Cast,
            ids(12),
            3,
            &cancel,
            |_| {},
            |id: String| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(SyncOutcome::new(id))
                }
            },
        )
        .await;

        assert_eq!(report.succeeded, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_scheduling() {
        let cancel = CancellationToken::new();
        let started = Arc::new(AtomicUsize::new(0));

        let report = run_batch(
            SyncKind::Discography,
            ids(10),
            1,
            &cancel,
            |_| {},
            |id: String| {
                let started = started.clone();
                let cancel = cancel.clone();
                async move {
                    if started.fetch_add(1, Ordering::SeqCst) == 1 {
                        cancel.cancel();
                    }
                    Ok::<_, String>(SyncOutcome::new(id))
                }
            },
        )
        .await;

        assert!(report.cancelled);
        assert_eq!(report.processed(), 2);
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pre_cancelled_batch_does_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = run_batch(
            SyncKind::SocialLinks,
            ids(3),
            2,
            &cancel,
            |_| {},
            |id: String| async move { Ok::<_, String>(SyncOutcome::new(id)) },
        )
        .await;

        assert_eq!(report.processed(), 0);
        assert!(report.cancelled);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_cancelled() {
        let cancel = CancellationToken::new();
        let report = run_batch(
            SyncKind::Filmography,
            Vec::<String>::new(),
            4,
            &cancel,
            |_| {},
            |id: String| async move { Ok::<_, String>(SyncOutcome::new(id)) },
        )
        .await;

        assert_eq!(report, BatchReport { duration_ms: report.duration_ms, ..BatchReport::empty(SyncKind::Filmography) });
    }
}
