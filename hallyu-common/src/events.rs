//! Event types and broadcast bus
//!
//! Sync jobs and merges publish `HallyuEvent`s on an [`EventBus`]; the HTTP
//! layer forwards them to SSE clients.

use crate::types::{MergeStrategy, SyncKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Back-office events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HallyuEvent {
    /// A sync batch was scheduled
    SyncStarted {
        job_id: Uuid,
        kind: SyncKind,
        strategy: MergeStrategy,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One entity of a batch finished (successfully or not)
    SyncProgress {
        job_id: Uuid,
        kind: SyncKind,
        entity_id: String,
        completed: usize,
        total: usize,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A batch finished or was cancelled
    SyncCompleted {
        job_id: Uuid,
        kind: SyncKind,
        total: usize,
        succeeded: usize,
        failed: usize,
        cancelled: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Two artist records were merged
    ArtistsMerged {
        keep_id: String,
        deleted_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl HallyuEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            HallyuEvent::SyncStarted { .. } => "SyncStarted",
            HallyuEvent::SyncProgress { .. } => "SyncProgress",
            HallyuEvent::SyncCompleted { .. } => "SyncCompleted",
            HallyuEvent::ArtistsMerged { .. } => "ArtistsMerged",
        }
    }
}

/// Broadcast bus for [`HallyuEvent`]s
///
/// Cloning shares the underlying channel. Subscribers only receive events
/// emitted after they subscribed; slow subscribers lose the oldest events
/// once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HallyuEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HallyuEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: HallyuEvent,
    ) -> Result<usize, broadcast::error::SendError<HallyuEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: HallyuEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(HallyuEvent::ArtistsMerged {
            keep_id: "keep".to_string(),
            deleted_id: "gone".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            HallyuEvent::ArtistsMerged { keep_id, deleted_id, .. } => {
                assert_eq!(keep_id, "keep");
                assert_eq!(deleted_id, "gone");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails_but_lossy_does_not_panic() {
        let bus = EventBus::new(4);
        let event = HallyuEvent::SyncStarted {
            job_id: Uuid::new_v4(),
            kind: SyncKind::Cast,
            strategy: MergeStrategy::Incremental,
            total: 3,
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_serialized_event_is_tagged() {
        let event = HallyuEvent::SyncCompleted {
            job_id: Uuid::nil(),
            kind: SyncKind::SocialLinks,
            total: 2,
            succeeded: 1,
            failed: 1,
            cancelled: false,
            duration_ms: 10,
            timestamp: Utc::now(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SyncCompleted");
        assert_eq!(json["kind"], "social_links");
        assert_eq!(event.event_type(), "SyncCompleted");
    }
}
