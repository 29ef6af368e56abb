//! Artist database operations

use crate::services::duplicate_detector::ArtistCandidate;
use hallyu_common::db::Artist;
use hallyu_common::{Result, SyncKind};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Entity picked for a sync run
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SyncTarget {
    /// Artist or production id
    pub id: String,
    /// TMDB id or MusicBrainz id, as text
    pub external_id: String,
    /// Display name for logs and progress events
    pub label: String,
    /// `movie`/`tv` for cast targets
    pub media_type: Option<String>,
}

/// Load a full artist row
pub async fn load_artist(conn: &mut SqliteConnection, id: &str) -> Result<Option<Artist>> {
    let artist = sqlx::query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(artist)
}

/// Insert a new artist row
pub async fn insert_artist(conn: &mut SqliteConnection, artist: &Artist) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artists (
            id, name_romanized, name_hangul, stage_names, birth_date, gender,
            place_of_birth, height_cm, bio, primary_image_url, agency_id,
            tmdb_id, mbid, social_links, view_count, favorite_count,
            filmography_synced_at, discography_synced_at, social_links_synced_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&artist.id)
    .bind(&artist.name_romanized)
    .bind(&artist.name_hangul)
    .bind(&artist.stage_names)
    .bind(&artist.birth_date)
    .bind(artist.gender)
    .bind(&artist.place_of_birth)
    .bind(artist.height_cm)
    .bind(&artist.bio)
    .bind(&artist.primary_image_url)
    .bind(&artist.agency_id)
    .bind(artist.tmdb_id)
    .bind(&artist.mbid)
    .bind(&artist.social_links)
    .bind(artist.view_count)
    .bind(artist.favorite_count)
    .bind(&artist.filmography_synced_at)
    .bind(&artist.discography_synced_at)
    .bind(&artist.social_links_synced_at)
    .bind(&artist.created_at)
    .bind(&artist.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrite the profile fields of an existing artist
///
/// Sync stamps and `created_at` are left untouched.
pub async fn update_artist_profile(conn: &mut SqliteConnection, artist: &Artist) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE artists SET
            name_romanized = ?, name_hangul = ?, stage_names = ?, birth_date = ?,
            gender = ?, place_of_birth = ?, height_cm = ?, bio = ?,
            primary_image_url = ?, agency_id = ?, tmdb_id = ?, mbid = ?,
            social_links = ?, view_count = ?, favorite_count = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&artist.name_romanized)
    .bind(&artist.name_hangul)
    .bind(&artist.stage_names)
    .bind(&artist.birth_date)
    .bind(artist.gender)
    .bind(&artist.place_of_birth)
    .bind(artist.height_cm)
    .bind(&artist.bio)
    .bind(&artist.primary_image_url)
    .bind(&artist.agency_id)
    .bind(artist.tmdb_id)
    .bind(&artist.mbid)
    .bind(&artist.social_links)
    .bind(artist.view_count)
    .bind(artist.favorite_count)
    .bind(&artist.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn delete_artist(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM artists WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Every artist with the fields used for duplicate matching
///
/// `filled_fields` counts set optional scalars; `relation_count` counts rows
/// in every table referencing the artist.
pub async fn load_duplicate_candidates(pool: &SqlitePool) -> Result<Vec<ArtistCandidate>> {
    let candidates = sqlx::query_as::<_, ArtistCandidate>(
        r#"
        SELECT
            a.id, a.name_romanized, a.name_hangul, a.tmdb_id, a.mbid, a.created_at,
            (
                (COALESCE(a.name_hangul, '') != '')
                + (a.birth_date IS NOT NULL)
                + (a.gender IS NOT NULL)
                + (a.place_of_birth IS NOT NULL)
                + (a.height_cm IS NOT NULL)
                + (COALESCE(a.bio, '') != '')
                + (a.primary_image_url IS NOT NULL)
                + (a.agency_id IS NOT NULL)
                + (a.tmdb_id IS NOT NULL)
                + (a.mbid IS NOT NULL)
            ) AS filled_fields,
            (
                (SELECT COUNT(*) FROM artist_productions WHERE artist_id = a.id)
                + (SELECT COUNT(*) FROM group_members WHERE artist_id = a.id)
                + (SELECT COUNT(*) FROM news_artists WHERE artist_id = a.id)
                + (SELECT COUNT(*) FROM user_favorites WHERE artist_id = a.id)
                + (SELECT COUNT(*) FROM albums WHERE artist_id = a.id)
            ) AS relation_count
        FROM artists a
        ORDER BY a.created_at, a.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(candidates)
}

/// Table and stamp column a sync kind reads and writes
fn sync_columns(kind: SyncKind) -> (&'static str, &'static str) {
    match kind {
        SyncKind::Filmography => ("artists", "filmography_synced_at"),
        SyncKind::Discography => ("artists", "discography_synced_at"),
        SyncKind::SocialLinks => ("artists", "social_links_synced_at"),
        SyncKind::Cast => ("productions", "cast_synced_at"),
    }
}

/// Pick entities to sync: those with the required external id, never-synced
/// first, then least recently synced
///
/// With `ids`, only those entities are considered.
pub async fn select_for_sync(
    pool: &SqlitePool,
    kind: SyncKind,
    limit: usize,
    ids: Option<&[String]>,
) -> Result<Vec<SyncTarget>> {
    let (_, stamp) = sync_columns(kind);
    let projection = match kind {
        SyncKind::Filmography => {
            "SELECT id, CAST(tmdb_id AS TEXT) AS external_id, name_romanized AS label, \
             NULL AS media_type FROM artists WHERE tmdb_id IS NOT NULL"
        }
        SyncKind::Discography | SyncKind::SocialLinks => {
            "SELECT id, mbid AS external_id, name_romanized AS label, \
             NULL AS media_type FROM artists WHERE COALESCE(mbid, '') != ''"
        }
        SyncKind::Cast => {
            "SELECT id, CAST(tmdb_id AS TEXT) AS external_id, title AS label, \
             media_type FROM productions WHERE tmdb_id IS NOT NULL"
        }
    };

    let id_filter = match ids {
        Some(ids) if ids.is_empty() => return Ok(Vec::new()),
        Some(ids) => format!(" AND id IN ({})", placeholders(ids.len())),
        None => String::new(),
    };

    let sql = format!(
        "{}{} ORDER BY {stamp} IS NOT NULL, {stamp}, id LIMIT ?",
        projection,
        id_filter,
        stamp = stamp
    );

    let mut query = sqlx::query_as::<_, SyncTarget>(&sql);
    for id in ids.unwrap_or_default() {
        query = query.bind(id);
    }
    let targets = query
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;

    Ok(targets)
}

/// Stamp the sync time of an entity
pub async fn mark_synced(conn: &mut SqliteConnection, kind: SyncKind, id: &str) -> Result<()> {
    let (table, stamp) = sync_columns(kind);
    sqlx::query(&format!(
        "UPDATE {} SET {} = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        table, stamp
    ))
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Artist ids keyed by TMDB person id, for the given TMDB ids that exist
pub async fn find_artist_ids_by_tmdb(
    conn: &mut SqliteConnection,
    tmdb_ids: &[i64],
) -> Result<HashMap<i64, String>> {
    if tmdb_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT tmdb_id, id FROM artists WHERE tmdb_id IN ({})",
        placeholders(tmdb_ids.len())
    );
    let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
    for tmdb_id in tmdb_ids {
        query = query.bind(tmdb_id);
    }

    Ok(query.fetch_all(conn).await?.into_iter().collect())
}

/// Replace the social links JSON of an artist
pub async fn update_social_links(
    conn: &mut SqliteConnection,
    id: &str,
    social_links_json: &str,
) -> Result<()> {
    sqlx::query("UPDATE artists SET social_links = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(social_links_json)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
