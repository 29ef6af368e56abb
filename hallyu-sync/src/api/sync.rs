//! Sync job handlers
//!
//! POST /sync/:kind, GET /sync/jobs, GET /sync/jobs/:id, DELETE /sync/jobs/:id

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use hallyu_common::{MergeStrategy, SyncKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::jobs::{spawn_sync_job, SyncJob};
use crate::services::SyncRequest;
use crate::AppState;

/// POST /sync/:kind request; omitted fields use the configured defaults
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartSyncRequest {
    pub strategy: Option<MergeStrategy>,
    pub limit: Option<usize>,
    pub concurrency: Option<usize>,
    pub ids: Option<Vec<String>>,
}

impl StartSyncRequest {
    /// An empty body means all defaults; anything else must parse
    fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid sync request body: {}", e)))
    }
}

/// POST /sync/:kind response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartSyncResponse {
    pub job_id: Uuid,
    pub kind: SyncKind,
    pub strategy: MergeStrategy,
    pub limit: usize,
    pub concurrency: usize,
}

/// POST /sync/:kind
///
/// Start a sync batch in the background. Returns 202 Accepted with the job
/// id, or 409 Conflict when a job of the same kind is running.
pub async fn start_sync(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<StartSyncResponse>)> {
    let kind: SyncKind = kind.parse().map_err(ApiError::BadRequest)?;
    let body = StartSyncRequest::from_body(&body)?;

    let mut request = SyncRequest::with_defaults(kind, &state.config.sync);
    if let Some(strategy) = body.strategy {
        request.strategy = strategy;
    }
    if let Some(limit) = body.limit {
        if limit == 0 {
            return Err(ApiError::BadRequest("limit must be greater than 0".to_string()));
        }
        request.limit = limit;
    }
    if let Some(concurrency) = body.concurrency {
        if concurrency == 0 {
            return Err(ApiError::BadRequest(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        request.concurrency = concurrency;
    }
    request.ids = body.ids;

    let response = StartSyncResponse {
        job_id: Uuid::nil(),
        kind,
        strategy: request.strategy,
        limit: request.limit,
        concurrency: request.concurrency,
    };

    let job_id = spawn_sync_job(&state, request).await?;

    tracing::info!(job_id = %job_id, kind = %kind, "Sync job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartSyncResponse { job_id, ..response }),
    ))
}

/// GET /sync/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<SyncJob>> {
    Json(state.jobs.list().await)
}

/// GET /sync/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<SyncJob>> {
    state
        .jobs
        .get(job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Sync job not found: {}", job_id)))
}

/// DELETE /sync/jobs/:id
///
/// Request cancellation. Items in flight finish; no new items start.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<SyncJob>> {
    let job = state.jobs.cancel(job_id).await?;
    Ok(Json(job))
}

/// Build sync routes
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/sync/jobs", get(list_jobs))
        .route("/sync/jobs/:id", get(get_job).delete(cancel_job))
        .route("/sync/:kind", post(start_sync))
}
