//! hallyu-sync - HallyuHub catalog maintenance service
//!
//! **Module Identity:**
//! - Name: hallyu-sync
//! - Port: 5740 (configurable)
//!
//! Artist duplicate detection and merge, plus TMDB / MusicBrainz enrichment
//! syncs, available as one-shot CLI commands or as an HTTP service with SSE
//! progress and an optional periodic scheduler.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hallyu_common::config::{self, TomlConfig};
use hallyu_common::events::EventBus;
use hallyu_common::{MergeStrategy, SyncKind};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use hallyu_sync::services::{ArtistMerger, DuplicateDetector, DuplicateReport, SyncRequest};
use hallyu_sync::AppState;

/// Command-line arguments for hallyu-sync
#[derive(Parser, Debug)]
#[command(name = "hallyu-sync")]
#[command(about = "HallyuHub artist deduplication and catalog sync")]
#[command(version)]
struct Cli {
    /// TOML config file (default: ~/.config/hallyu/hallyu-sync.toml)
    #[arg(short, long, env = "HALLYU_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding hallyu.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides the TOML config)
        #[arg(short, long, env = "HALLYU_SYNC_PORT")]
        port: Option<u16>,
    },

    /// List duplicate artist groups
    Duplicates {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge one artist into another
    Merge {
        /// Artist id to keep
        #[arg(long)]
        keep: String,

        /// Artist id to fold into the kept one and delete
        #[arg(long)]
        delete: String,
    },

    /// Run one sync batch in the foreground
    Sync {
        /// filmography, discography, social-links or cast
        kind: SyncKind,

        /// replace-all, incremental or merge
        #[arg(short, long)]
        strategy: Option<MergeStrategy>,

        /// Maximum number of entities
        #[arg(short, long)]
        limit: Option<usize>,

        /// Entities processed concurrently
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Only sync these entity ids (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// Store the TMDB API key in the database (takes precedence over env and TOML)
    SetTmdbKey {
        /// TMDB v3 API key
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::default(),
    };

    init_tracing(&toml_config)?;

    info!("Starting hallyu-sync v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), &toml_config);
    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db = hallyu_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    match cli.command {
        Command::Serve { port } => serve(db, toml_config, port).await,
        Command::Duplicates { json } => {
            let report = DuplicateDetector::new(db, toml_config.duplicates.clone())
                .scan()
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_duplicates(&report);
            }
            Ok(())
        }
        Command::Merge { keep, delete } => {
            let report = ArtistMerger::new(db, EventBus::new(16))
                .merge(&keep, &delete)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Sync {
            kind,
            strategy,
            limit,
            concurrency,
            ids,
        } => {
            let mut request = SyncRequest::with_defaults(kind, &toml_config.sync);
            request.strategy = strategy.unwrap_or(request.strategy);
            request.limit = limit.unwrap_or(request.limit);
            request.concurrency = concurrency.unwrap_or(request.concurrency).max(1);
            request.ids = (!ids.is_empty()).then_some(ids);

            run_sync(db, toml_config, request).await
        }
        Command::SetTmdbKey { key } => {
            hallyu_sync::db::settings::set_tmdb_api_key(&db, key).await?;
            info!("TMDB API key stored in database");
            Ok(())
        }
    }
}

/// Console logging plus an optional log file; `RUST_LOG` overrides the
/// configured level
fn init_tracing(toml_config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "hallyu_sync={level},hallyu_common={level},tower_http=info",
            level = toml_config.logging.level
        )
        .into()
    });

    let file_layer = match &toml_config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

async fn serve(db: sqlx::SqlitePool, toml_config: TomlConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(toml_config.port);
    let schedule_interval = toml_config.sync.schedule_interval_secs;

    let sources = hallyu_sync::build_sources(&db, &toml_config).await?;
    let event_bus = EventBus::new(256);
    let state = AppState::new(db, event_bus, toml_config, sources);

    let shutdown = CancellationToken::new();
    let scheduler = match schedule_interval {
        Some(secs) if secs > 0 => Some(hallyu_sync::scheduler::spawn_scheduler(
            state.clone(),
            Duration::from_secs(secs),
            shutdown.clone(),
        )),
        _ => None,
    };

    let app = hallyu_sync::build_router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    state.jobs.cancel_all().await;
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn run_sync(db: sqlx::SqlitePool, toml_config: TomlConfig, request: SyncRequest) -> Result<()> {
    let sources = hallyu_sync::build_sources(&db, &toml_config).await?;
    let state = AppState::new(db, EventBus::new(16), toml_config, sources);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let report = state
        .orchestrator
        .run(Uuid::new_v4(), &request, &cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_duplicates(report: &DuplicateReport) {
    println!(
        "Scanned {} artists ({} in name sample{}): {} high, {} medium, {} low",
        report.scanned,
        report.name_sample_size,
        if report.truncated { ", truncated" } else { "" },
        report.high_count,
        report.medium_count,
        report.low_count
    );

    for group in &report.groups {
        println!(
            "\n[{:?}] {:?} score={:.2} on \"{}\" keep={}",
            group.confidence, group.reason, group.score, group.matched_on, group.suggested_keep_id
        );
        for artist in &group.artists {
            println!(
                "  {}  {}{}",
                artist.id,
                artist.name_romanized,
                artist
                    .name_hangul
                    .as_deref()
                    .map(|h| format!(" ({})", h))
                    .unwrap_or_default()
            );
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
