//! Artist discography from MusicBrainz release groups
//!
//! Only albums carrying a MusicBrainz id take part; curated albums without
//! one survive every strategy, `replace_all` included.

use super::{SyncError, SyncOrchestrator};
use crate::db::albums::{delete_release, insert_release, load_tracked_albums, update_release};
use crate::db::artists::{mark_synced, SyncTarget};
use crate::services::batch_runner::SyncOutcome;
use crate::services::merge_strategy::reconcile;
use crate::services::sources::ReleaseEntry;
use crate::utils::{begin_monitored, retry_on_lock, retry_with_backoff, DEFAULT_MAX_LOCK_WAIT_MS};
use hallyu_common::{MergeStrategy, Result, SyncKind};

pub(super) async fn sync(
    orchestrator: &SyncOrchestrator,
    target: &SyncTarget,
    strategy: MergeStrategy,
) -> std::result::Result<SyncOutcome, SyncError> {
    let artist_mbid = target.external_id.as_str();
    if artist_mbid.trim().is_empty() {
        return Err(SyncError::InvalidTarget(format!("artist {} has no MusicBrainz id", target.id)));
    }

    let source = &orchestrator.sources().discography;
    let fetched = retry_with_backoff("musicbrainz::discography", orchestrator.retry_policy(), || {
        source.fetch_discography(artist_mbid)
    })
    .await?;

    let outcome = retry_on_lock("sync::discography", DEFAULT_MAX_LOCK_WAIT_MS, || {
        apply(orchestrator, &target.id, fetched.clone(), strategy)
    })
    .await?;

    Ok(outcome)
}

async fn apply(
    orchestrator: &SyncOrchestrator,
    artist_id: &str,
    fetched: Vec<ReleaseEntry>,
    strategy: MergeStrategy,
) -> Result<SyncOutcome> {
    let mut tx = begin_monitored(orchestrator.db(), "sync::discography").await?;

    let existing = load_tracked_albums(tx.conn(), artist_id).await?;
    let plan = reconcile(&existing, fetched, strategy);

    let mut outcome = SyncOutcome::new(artist_id);
    outcome.unchanged = plan.unchanged;

    for release in &plan.remove {
        delete_release(tx.conn(), artist_id, &release.mbid).await?;
        outcome.removed += 1;
    }

    for release in &plan.update {
        update_release(tx.conn(), artist_id, release).await?;
        outcome.updated += 1;
    }

    for release in &plan.insert {
        if insert_release(tx.conn(), artist_id, release).await? {
            outcome.added += 1;
        } else {
            tracing::debug!(
                artist_id,
                mbid = %release.mbid,
                "Release already stored for another artist"
            );
            outcome.skipped += 1;
        }
    }

    mark_synced(tx.conn(), SyncKind::Discography, artist_id).await?;
    tx.commit().await?;

    Ok(outcome)
}
