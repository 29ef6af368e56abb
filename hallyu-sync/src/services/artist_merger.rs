//! Artist merge
//!
//! Folds a duplicate artist into the record being kept, in one transaction:
//!
//! 1. Relation rows (favorites, credits, memberships, news links) are copied
//!    to the kept artist with `INSERT OR IGNORE`, so rows the kept artist
//!    already has win, then removed from the deleted artist.
//! 2. Albums are re-pointed.
//! 3. Scalar fields are merged: counters summed, stage names and social
//!    links unioned, empty fields of the kept record backfilled.
//! 4. The deleted artist row is removed before the kept row is rewritten, so
//!    unique external ids (`tmdb_id`, `mbid`) can move across.

use crate::db::artists::{delete_artist, load_artist, update_artist_profile};
use crate::services::name_normalizer::normalize_name;
use crate::utils::{begin_monitored, retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use chrono::Utc;
use hallyu_common::db::Artist;
use hallyu_common::events::{EventBus, HallyuEvent};
use hallyu_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;

/// Table referencing artists through an `artist_id` column
struct RelationTable {
    name: &'static str,
    /// Columns copied as is, besides `artist_id`
    columns: &'static str,
}

const RELATION_TABLES: [RelationTable; 4] = [
    RelationTable {
        name: "user_favorites",
        columns: "user_id, created_at",
    },
    RelationTable {
        name: "artist_productions",
        columns: "production_id, role, character_name, sort_order, created_at",
    },
    RelationTable {
        name: "group_members",
        columns: "group_id, role, is_active, joined_at",
    },
    RelationTable {
        name: "news_artists",
        columns: "news_id",
    },
];

/// Rows moved to the kept artist, and rows dropped because the kept artist
/// already had an equivalent one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMove {
    pub relation: String,
    pub moved: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub keep_id: String,
    pub deleted_id: String,
    pub relations: Vec<RelationMove>,
    pub albums_moved: u64,
    /// Kept-record fields filled from the deleted record
    pub backfilled_fields: Vec<String>,
}

/// Merges duplicate artist records
pub struct ArtistMerger {
    db: SqlitePool,
    event_bus: EventBus,
}

impl ArtistMerger {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Merge `delete_id` into `keep_id`
    ///
    /// Retried on SQLite lock errors; any other failure rolls back.
    pub async fn merge(&self, keep_id: &str, delete_id: &str) -> Result<MergeReport> {
        if keep_id == delete_id {
            return Err(Error::InvalidInput(
                "Cannot merge an artist into itself".to_string(),
            ));
        }

        let report = retry_on_lock("artist_merger::merge", DEFAULT_MAX_LOCK_WAIT_MS, || {
            self.merge_once(keep_id, delete_id)
        })
        .await?;

        tracing::info!(
            keep_id = %report.keep_id,
            deleted_id = %report.deleted_id,
            albums_moved = report.albums_moved,
            backfilled = ?report.backfilled_fields,
            "Artists merged"
        );

        self.event_bus.emit_lossy(HallyuEvent::ArtistsMerged {
            keep_id: report.keep_id.clone(),
            deleted_id: report.deleted_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    async fn merge_once(&self, keep_id: &str, delete_id: &str) -> Result<MergeReport> {
        let mut tx = begin_monitored(&self.db, "artist_merger::merge").await?;

        let keep = load_artist(tx.conn(), keep_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Artist {} not found", keep_id)))?;
        let delete = load_artist(tx.conn(), delete_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Artist {} not found", delete_id)))?;

        let mut relations = Vec::with_capacity(RELATION_TABLES.len());
        for table in &RELATION_TABLES {
            relations.push(move_relation(tx.conn(), table, keep_id, delete_id).await?);
        }

        let albums_moved = sqlx::query(
            "UPDATE albums SET artist_id = ?, updated_at = CURRENT_TIMESTAMP WHERE artist_id = ?",
        )
        .bind(keep_id)
        .bind(delete_id)
        .execute(tx.conn())
        .await?
        .rows_affected();

        let (merged, backfilled_fields) = merge_artist_fields(&keep, &delete)?;

        delete_artist(tx.conn(), delete_id).await?;
        update_artist_profile(tx.conn(), &merged).await?;

        tx.commit().await?;

        Ok(MergeReport {
            keep_id: keep_id.to_string(),
            deleted_id: delete_id.to_string(),
            relations,
            albums_moved,
            backfilled_fields,
        })
    }
}

async fn move_relation(
    conn: &mut SqliteConnection,
    table: &RelationTable,
    keep_id: &str,
    delete_id: &str,
) -> Result<RelationMove> {
    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE artist_id = ?",
        table.name
    ))
    .bind(delete_id)
    .fetch_one(&mut *conn)
    .await?;

    let moved = sqlx::query(&format!(
        "INSERT OR IGNORE INTO {table} (artist_id, {cols}) SELECT ?, {cols} FROM {table} WHERE artist_id = ?",
        table = table.name,
        cols = table.columns
    ))
    .bind(keep_id)
    .bind(delete_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query(&format!("DELETE FROM {} WHERE artist_id = ?", table.name))
        .bind(delete_id)
        .execute(&mut *conn)
        .await?;

    let total = u64::try_from(total).unwrap_or_default();
    Ok(RelationMove {
        relation: table.name.to_string(),
        moved,
        dropped: total.saturating_sub(moved),
    })
}

trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Blank for i64 {
    fn is_blank(&self) -> bool {
        false
    }
}

fn is_missing<T: Blank>(value: &Option<T>) -> bool {
    value.as_ref().map_or(true, Blank::is_blank)
}

/// Merged record for `keep` plus the names of backfilled fields
pub fn merge_artist_fields(keep: &Artist, delete: &Artist) -> Result<(Artist, Vec<String>)> {
    let mut merged = keep.clone();
    let mut backfilled = Vec::new();

    macro_rules! backfill {
        ($($field:ident),+ $(,)?) => {
            $(
                if is_missing(&merged.$field) && !is_missing(&delete.$field) {
                    merged.$field = delete.$field.clone();
                    backfilled.push(stringify!($field).to_string());
                }
            )+
        };
    }

    backfill!(
        name_hangul,
        birth_date,
        gender,
        place_of_birth,
        height_cm,
        bio,
        primary_image_url,
        agency_id,
        tmdb_id,
        mbid,
    );

    merged.view_count = keep.view_count.saturating_add(delete.view_count);
    merged.favorite_count = keep.favorite_count.saturating_add(delete.favorite_count);

    let stage_names = union_stage_names(&keep.stage_names(), &delete.stage_names());
    if !stage_names.is_empty() {
        merged.stage_names = Some(serde_json::to_string(&stage_names)?);
    }

    let mut social_links = delete.social_links();
    social_links.extend(keep.social_links());
    if !social_links.is_empty() {
        merged.social_links = Some(serde_json::to_string(&social_links)?);
    }

    Ok((merged, backfilled))
}

/// Kept names first; later names equal after normalization are dropped
fn union_stage_names(keep: &[String], delete: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keep.iter()
        .chain(delete)
        .filter(|name| {
            let key = normalize_name(name);
            !key.is_empty() && seen.insert(key)
        })
        .cloned()
        .collect()
}
