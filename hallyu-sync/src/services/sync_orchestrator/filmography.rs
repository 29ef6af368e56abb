//! Artist filmography from TMDB combined credits

use super::{SyncError, SyncOrchestrator};
use crate::db::artists::{mark_synced, SyncTarget};
use crate::db::productions::{
    delete_credit, insert_credit, load_artist_credits, update_credit, upsert_production,
};
use crate::services::batch_runner::SyncOutcome;
use crate::services::merge_strategy::reconcile;
use crate::services::sources::CreditEntry;
use crate::utils::{begin_monitored, retry_on_lock, retry_with_backoff, DEFAULT_MAX_LOCK_WAIT_MS};
use hallyu_common::{MergeStrategy, Result, SyncKind};

pub(super) async fn sync(
    orchestrator: &SyncOrchestrator,
    target: &SyncTarget,
    strategy: MergeStrategy,
) -> std::result::Result<SyncOutcome, SyncError> {
    let person_tmdb_id: i64 = target.external_id.parse().map_err(|_| {
        SyncError::InvalidTarget(format!("artist {} has TMDB id {:?}", target.id, target.external_id))
    })?;

    let source = &orchestrator.sources().filmography;
    let fetched = retry_with_backoff("tmdb::filmography", orchestrator.retry_policy(), || {
        source.fetch_filmography(person_tmdb_id)
    })
    .await?;

    let outcome = retry_on_lock("sync::filmography", DEFAULT_MAX_LOCK_WAIT_MS, || {
        apply(orchestrator, &target.id, fetched.clone(), strategy)
    })
    .await?;

    Ok(outcome)
}

async fn apply(
    orchestrator: &SyncOrchestrator,
    artist_id: &str,
    fetched: Vec<CreditEntry>,
    strategy: MergeStrategy,
) -> Result<SyncOutcome> {
    let mut tx = begin_monitored(orchestrator.db(), "sync::filmography").await?;

    let (existing, production_ids) = load_artist_credits(tx.conn(), artist_id).await?;
    let plan = reconcile(&existing, fetched, strategy);

    let mut outcome = SyncOutcome::new(artist_id);
    outcome.unchanged = plan.unchanged;

    for credit in &plan.remove {
        if let Some(production_id) = production_ids.get(&credit.production_key()) {
            delete_credit(tx.conn(), artist_id, production_id).await?;
            outcome.removed += 1;
        }
    }

    for credit in &plan.update {
        if let Some(production_id) = production_ids.get(&credit.production_key()) {
            update_credit(
                tx.conn(),
                artist_id,
                production_id,
                credit.character_name.as_deref(),
                credit.sort_order,
            )
            .await?;
            outcome.updated += 1;
        }
    }

    for credit in &plan.insert {
        let production_id = upsert_production(tx.conn(), credit).await?;
        let linked = insert_credit(
            tx.conn(),
            artist_id,
            &production_id,
            credit.character_name.as_deref(),
            credit.sort_order,
        )
        .await?;

        if linked {
            outcome.added += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    mark_synced(tx.conn(), SyncKind::Filmography, artist_id).await?;
    tx.commit().await?;

    Ok(outcome)
}
