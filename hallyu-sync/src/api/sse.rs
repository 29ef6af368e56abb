//! Server-Sent Events (SSE) for sync progress and merges

use crate::AppState;
use axum::{extract::State, response::IntoResponse};

/// GET /events
///
/// Streams SyncStarted, SyncProgress, SyncCompleted and ArtistsMerged events.
pub async fn event_stream(State(state): State<AppState>) -> impl IntoResponse {
    hallyu_common::sse::event_bus_sse_stream(&state.event_bus, "hallyu-sync")
}
