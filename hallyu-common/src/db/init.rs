//! Database initialization
//!
//! Opens (or creates) the catalog database and creates every table the
//! back-office jobs touch. All `CREATE` statements are idempotent, so this is
//! safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open the catalog database at `db_path`, creating file and schema if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets the HTTP handlers read while a batch job writes
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection that never expires: every pooled
/// connection to `sqlite::memory:` would otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and index used by the catalog
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_agencies_table(pool).await?;
    create_artists_table(pool).await?;
    create_productions_table(pool).await?;
    create_artist_productions_table(pool).await?;
    create_music_groups_table(pool).await?;
    create_group_members_table(pool).await?;
    create_news_tables(pool).await?;
    create_user_tables(pool).await?;
    create_albums_table(pool).await?;

    tracing::debug!("Catalog schema ready");
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_agencies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agencies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id TEXT PRIMARY KEY,
            name_romanized TEXT NOT NULL,
            name_hangul TEXT,
            stage_names TEXT,
            birth_date TEXT,
            gender INTEGER,
            place_of_birth TEXT,
            height_cm INTEGER,
            bio TEXT,
            primary_image_url TEXT,
            agency_id TEXT REFERENCES agencies(id),
            tmdb_id INTEGER UNIQUE,
            mbid TEXT UNIQUE,
            social_links TEXT,
            view_count INTEGER NOT NULL DEFAULT 0,
            favorite_count INTEGER NOT NULL DEFAULT 0,
            filmography_synced_at TEXT,
            discography_synced_at TEXT,
            social_links_synced_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artists_name_hangul ON artists(name_hangul)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_productions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS productions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            original_title TEXT,
            media_type TEXT NOT NULL CHECK (media_type IN ('movie', 'tv')),
            tmdb_id INTEGER,
            release_year INTEGER,
            cast_synced_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (media_type, tmdb_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_artist_productions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artist_productions (
            artist_id TEXT NOT NULL REFERENCES artists(id),
            production_id TEXT NOT NULL REFERENCES productions(id),
            role TEXT,
            character_name TEXT,
            sort_order INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (artist_id, production_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_artist_productions_production ON artist_productions(production_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_music_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS music_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            mbid TEXT UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_group_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL REFERENCES music_groups(id),
            artist_id TEXT NOT NULL REFERENCES artists(id),
            role TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            joined_at TEXT,
            PRIMARY KEY (group_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_news_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            published_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news_artists (
            news_id TEXT NOT NULL REFERENCES news(id),
            artist_id TEXT NOT NULL REFERENCES artists(id),
            PRIMARY KEY (news_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_user_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_favorites (
            user_id TEXT NOT NULL REFERENCES users(id),
            artist_id TEXT NOT NULL REFERENCES artists(id),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, artist_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_albums_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            id TEXT PRIMARY KEY,
            artist_id TEXT NOT NULL REFERENCES artists(id),
            title TEXT NOT NULL,
            album_type TEXT NOT NULL CHECK (album_type IN ('ALBUM', 'EP', 'SINGLE')),
            release_date TEXT,
            mbid TEXT UNIQUE,
            cover_url TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id)")
        .execute(pool)
        .await?;
    Ok(())
}
