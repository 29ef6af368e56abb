//! Production and credit database operations
//!
//! Credits live in `artist_productions`, one row per (artist, production).

use crate::services::sources::{CastEntry, CreditEntry, MediaType};
use hallyu_common::db::Production;
use hallyu_common::Result;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use uuid::Uuid;

const ACTOR_ROLE: &str = "actor";

/// Stored credit of an artist together with its production row id
#[derive(Debug, Clone, sqlx::FromRow)]
struct CreditRow {
    production_id: String,
    tmdb_id: i64,
    media_type: String,
    title: String,
    original_title: Option<String>,
    release_year: Option<i64>,
    character_name: Option<String>,
    sort_order: Option<i64>,
}

/// Insert or enrich a production by media type and TMDB id, returning its row id
///
/// An existing production keeps its title; empty columns are filled.
pub async fn upsert_production(conn: &mut SqliteConnection, credit: &CreditEntry) -> Result<String> {
    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO productions (id, title, original_title, media_type, tmdb_id, release_year)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(media_type, tmdb_id) DO UPDATE SET
            original_title = COALESCE(productions.original_title, excluded.original_title),
            release_year = COALESCE(productions.release_year, excluded.release_year),
            updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&credit.title)
    .bind(&credit.original_title)
    .bind(credit.media_type.as_str())
    .bind(credit.production_tmdb_id)
    .bind(credit.release_year)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

pub async fn insert_production(conn: &mut SqliteConnection, production: &Production) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO productions (id, title, original_title, media_type, tmdb_id, release_year, cast_synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&production.id)
    .bind(&production.title)
    .bind(&production.original_title)
    .bind(&production.media_type)
    .bind(production.tmdb_id)
    .bind(production.release_year)
    .bind(&production.cast_synced_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn load_production(conn: &mut SqliteConnection, id: &str) -> Result<Option<Production>> {
    let production = sqlx::query_as::<_, Production>(
        "SELECT id, title, original_title, media_type, tmdb_id, release_year, cast_synced_at \
         FROM productions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(production)
}

/// TMDB-backed credits of an artist, with production row ids keyed by
/// (media type, TMDB id)
///
/// Credits on productions without a TMDB id are not returned and so never
/// take part in reconciliation.
pub async fn load_artist_credits(
    conn: &mut SqliteConnection,
    artist_id: &str,
) -> Result<(Vec<CreditEntry>, HashMap<(MediaType, i64), String>)> {
    let rows = sqlx::query_as::<_, CreditRow>(
        r#"
        SELECT p.id AS production_id, p.tmdb_id, p.media_type, p.title, p.original_title,
               p.release_year, ap.character_name, ap.sort_order
        FROM artist_productions ap
        JOIN productions p ON p.id = ap.production_id
        WHERE ap.artist_id = ? AND p.tmdb_id IS NOT NULL
        ORDER BY p.media_type, p.tmdb_id
        "#,
    )
    .bind(artist_id)
    .fetch_all(conn)
    .await?;

    let mut production_ids = HashMap::with_capacity(rows.len());
    let mut credits = Vec::with_capacity(rows.len());

    for row in rows {
        let media_type = match row.media_type.parse::<MediaType>() {
            Ok(media_type) => media_type,
            Err(e) => {
                tracing::warn!(production_id = %row.production_id, error = %e, "Skipping credit");
                continue;
            }
        };
        production_ids.insert((media_type, row.tmdb_id), row.production_id);
        credits.push(CreditEntry {
            production_tmdb_id: row.tmdb_id,
            media_type,
            title: row.title,
            original_title: row.original_title,
            release_year: row.release_year,
            character_name: row.character_name,
            sort_order: row.sort_order,
        });
    }

    Ok((credits, production_ids))
}

/// Cast of a production restricted to artists with a TMDB id
pub async fn load_production_cast(
    conn: &mut SqliteConnection,
    production_id: &str,
) -> Result<Vec<CastEntry>> {
    let rows = sqlx::query_as::<_, (i64, String, Option<String>, Option<i64>)>(
        r#"
        SELECT a.tmdb_id, a.name_romanized, ap.character_name, ap.sort_order
        FROM artist_productions ap
        JOIN artists a ON a.id = ap.artist_id
        WHERE ap.production_id = ? AND a.tmdb_id IS NOT NULL
        ORDER BY a.tmdb_id
        "#,
    )
    .bind(production_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(person_tmdb_id, name, character_name, sort_order)| CastEntry {
            person_tmdb_id,
            name,
            character_name,
            sort_order,
        })
        .collect())
}

/// Link an artist to a production; false if the link already existed
pub async fn insert_credit(
    conn: &mut SqliteConnection,
    artist_id: &str,
    production_id: &str,
    character_name: Option<&str>,
    sort_order: Option<i64>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO artist_productions (artist_id, production_id, role, character_name, sort_order)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(artist_id, production_id) DO NOTHING
        "#,
    )
    .bind(artist_id)
    .bind(production_id)
    .bind(ACTOR_ROLE)
    .bind(character_name)
    .bind(sort_order)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_credit(
    conn: &mut SqliteConnection,
    artist_id: &str,
    production_id: &str,
    character_name: Option<&str>,
    sort_order: Option<i64>,
) -> Result<()> {
    sqlx::query(
        "UPDATE artist_productions SET character_name = ?, sort_order = ? \
         WHERE artist_id = ? AND production_id = ?",
    )
    .bind(character_name)
    .bind(sort_order)
    .bind(artist_id)
    .bind(production_id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn delete_credit(
    conn: &mut SqliteConnection,
    artist_id: &str,
    production_id: &str,
) -> Result<()> {
    sqlx::query("DELETE FROM artist_productions WHERE artist_id = ? AND production_id = ?")
        .bind(artist_id)
        .bind(production_id)
        .execute(conn)
        .await?;

    Ok(())
}
