//! hallyu-sync library interface
//!
//! Artist duplicate detection and merge, and TMDB / MusicBrainz enrichment
//! syncs for the HallyuHub catalog. Exposes public APIs for the binary and
//! for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod scheduler;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use crate::jobs::JobRegistry;
use crate::services::{MusicBrainzClient, Sources, SyncOrchestrator, TmdbClient};
use crate::utils::RetryPolicy;
use axum::Router;
use chrono::{DateTime, Utc};
use hallyu_common::config::TomlConfig;
use hallyu_common::events::EventBus;
use hallyu_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub config: Arc<TomlConfig>,
    pub orchestrator: Arc<SyncOrchestrator>,
    /// Background sync jobs and their cancellation tokens
    pub jobs: JobRegistry,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: TomlConfig, sources: Sources) -> Self {
        let orchestrator = SyncOrchestrator::new(
            db.clone(),
            sources,
            RetryPolicy::from_config(&config.sync),
            event_bus.clone(),
        );

        Self {
            db,
            event_bus,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            jobs: JobRegistry::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build the production TMDB and MusicBrainz clients
///
/// One client per API is shared by every sync using it, so each API's rate
/// limit holds across concurrent jobs.
pub async fn build_sources(db: &SqlitePool, config: &TomlConfig) -> Result<Sources> {
    let tmdb_api_key = crate::config::resolve_tmdb_api_key(db, config).await?;

    let tmdb = Arc::new(
        TmdbClient::new(tmdb_api_key, config.sync.tmdb_requests_per_second)
            .map_err(|e| Error::Internal(format!("TMDB client: {}", e)))?,
    );
    let musicbrainz = Arc::new(
        MusicBrainzClient::new().map_err(|e| Error::Internal(format!("MusicBrainz client: {}", e)))?,
    );

    Ok(Sources {
        filmography: tmdb.clone(),
        discography: musicbrainz.clone(),
        social_links: musicbrainz,
        cast: tmdb,
    })
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::artist_routes())
        .merge(api::sync_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
