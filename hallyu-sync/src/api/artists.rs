//! Artist deduplication handlers
//!
//! GET /artists/duplicates, POST /artists/merge

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::services::{ArtistMerger, DuplicateDetector, DuplicateReport, MergeReport};
use crate::AppState;

/// POST /artists/merge request
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub keep_id: String,
    pub delete_id: String,
}

/// GET /artists/duplicates
///
/// Scan the catalog for duplicate artists.
pub async fn list_duplicates(State(state): State<AppState>) -> ApiResult<Json<DuplicateReport>> {
    let detector = DuplicateDetector::new(state.db.clone(), state.config.duplicates.clone());
    let report = detector.scan().await?;
    Ok(Json(report))
}

/// POST /artists/merge
///
/// Merge `delete_id` into `keep_id`. 400 when both ids are the same, 404 when
/// either artist is missing.
pub async fn merge_artists(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<MergeReport>> {
    let keep_id = request.keep_id.trim();
    let delete_id = request.delete_id.trim();
    if keep_id.is_empty() || delete_id.is_empty() {
        return Err(ApiError::BadRequest(
            "keep_id and delete_id are required".to_string(),
        ));
    }

    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());
    let report = merger.merge(keep_id, delete_id).await?;
    Ok(Json(report))
}

/// Build artist routes
pub fn artist_routes() -> Router<AppState> {
    Router::new()
        .route("/artists/duplicates", get(list_duplicates))
        .route("/artists/merge", post(merge_artists))
}
