//! Production cast from TMDB credits
//!
//! Cast members are linked only when an artist with the same TMDB person id
//! already exists; everyone else is counted as skipped. Artists are never
//! created by this sync.

use super::{SyncError, SyncOrchestrator};
use crate::db::artists::{find_artist_ids_by_tmdb, mark_synced, SyncTarget};
use crate::db::productions::{delete_credit, insert_credit, load_production_cast, update_credit};
use crate::services::batch_runner::SyncOutcome;
use crate::services::merge_strategy::{dedup_by_key, reconcile};
use crate::services::sources::{CastEntry, MediaType};
use crate::utils::{begin_monitored, retry_on_lock, retry_with_backoff, DEFAULT_MAX_LOCK_WAIT_MS};
use hallyu_common::{MergeStrategy, Result, SyncKind};

pub(super) async fn sync(
    orchestrator: &SyncOrchestrator,
    target: &SyncTarget,
    strategy: MergeStrategy,
) -> std::result::Result<SyncOutcome, SyncError> {
    let production_tmdb_id: i64 = target.external_id.parse().map_err(|_| {
        SyncError::InvalidTarget(format!(
            "production {} has TMDB id {:?}",
            target.id, target.external_id
        ))
    })?;
    let media_type: MediaType = target
        .media_type
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(SyncError::InvalidTarget)?;

    let source = &orchestrator.sources().cast;
    let fetched = retry_with_backoff("tmdb::cast", orchestrator.retry_policy(), || {
        source.fetch_cast(media_type, production_tmdb_id)
    })
    .await?;

    let outcome = retry_on_lock("sync::cast", DEFAULT_MAX_LOCK_WAIT_MS, || {
        apply(orchestrator, &target.id, fetched.clone(), strategy)
    })
    .await?;

    Ok(outcome)
}

async fn apply(
    orchestrator: &SyncOrchestrator,
    production_id: &str,
    fetched: Vec<CastEntry>,
    strategy: MergeStrategy,
) -> Result<SyncOutcome> {
    let mut tx = begin_monitored(orchestrator.db(), "sync::cast").await?;

    let existing = load_production_cast(tx.conn(), production_id).await?;
    let fetched = dedup_by_key(fetched);

    let mut person_ids: Vec<i64> = fetched.iter().map(|c| c.person_tmdb_id).collect();
    person_ids.extend(existing.iter().map(|c| c.person_tmdb_id));
    person_ids.sort_unstable();
    person_ids.dedup();
    let artist_ids = find_artist_ids_by_tmdb(tx.conn(), &person_ids).await?;

    let (known, unknown): (Vec<CastEntry>, Vec<CastEntry>) = fetched
        .into_iter()
        .partition(|c| artist_ids.contains_key(&c.person_tmdb_id));

    let plan = reconcile(&existing, known, strategy);

    let mut outcome = SyncOutcome::new(production_id);
    outcome.unchanged = plan.unchanged;
    outcome.skipped = unknown.len();

    for member in &plan.remove {
        if let Some(artist_id) = artist_ids.get(&member.person_tmdb_id) {
            delete_credit(tx.conn(), artist_id, production_id).await?;
            outcome.removed += 1;
        }
    }

    for member in &plan.update {
        if let Some(artist_id) = artist_ids.get(&member.person_tmdb_id) {
            update_credit(
                tx.conn(),
                artist_id,
                production_id,
                member.character_name.as_deref(),
                member.sort_order,
            )
            .await?;
            outcome.updated += 1;
        }
    }

    for member in &plan.insert {
        if let Some(artist_id) = artist_ids.get(&member.person_tmdb_id) {
            if insert_credit(
                tx.conn(),
                artist_id,
                production_id,
                member.character_name.as_deref(),
                member.sort_order,
            )
            .await?
            {
                outcome.added += 1;
            } else {
                outcome.skipped += 1;
            }
        }
    }

    mark_synced(tx.conn(), SyncKind::Cast, production_id).await?;
    tx.commit().await?;

    Ok(outcome)
}
