//! GET /health

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::jobs::JobState;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the catalog database does not answer
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: bool,
    pub jobs: JobCounts,
    /// Most recent sync job failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JobCounts {
    pub running: usize,
    pub finished: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let jobs = state.jobs.list().await.iter().fold(JobCounts::default(), |mut counts, job| {
        if job.state == JobState::Running {
            counts.running += 1;
        } else {
            counts.finished += 1;
        }
        counts
    });

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (Utc::now() - state.startup_time).num_seconds().max(0) as u64,
        database,
        jobs,
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
