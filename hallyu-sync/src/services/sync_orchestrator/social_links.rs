//! Artist social links from MusicBrainz URL relations
//!
//! Links are stored on the artist row as a JSON object keyed by platform.

use super::{SyncError, SyncOrchestrator};
use crate::db::artists::{load_artist, mark_synced, update_social_links, SyncTarget};
use crate::services::batch_runner::SyncOutcome;
use crate::services::merge_strategy::reconcile;
use crate::services::sources::SocialLink;
use crate::utils::{begin_monitored, retry_on_lock, retry_with_backoff, DEFAULT_MAX_LOCK_WAIT_MS};
use hallyu_common::{Error, MergeStrategy, Result, SyncKind};

pub(super) async fn sync(
    orchestrator: &SyncOrchestrator,
    target: &SyncTarget,
    strategy: MergeStrategy,
) -> std::result::Result<SyncOutcome, SyncError> {
    let artist_mbid = target.external_id.as_str();
    if artist_mbid.trim().is_empty() {
        return Err(SyncError::InvalidTarget(format!("artist {} has no MusicBrainz id", target.id)));
    }

    let source = &orchestrator.sources().social_links;
    let fetched = retry_with_backoff("musicbrainz::social_links", orchestrator.retry_policy(), || {
        source.fetch_social_links(artist_mbid)
    })
    .await?;

    let outcome = retry_on_lock("sync::social_links", DEFAULT_MAX_LOCK_WAIT_MS, || {
        apply(orchestrator, &target.id, fetched.clone(), strategy)
    })
    .await?;

    Ok(outcome)
}

async fn apply(
    orchestrator: &SyncOrchestrator,
    artist_id: &str,
    fetched: Vec<SocialLink>,
    strategy: MergeStrategy,
) -> Result<SyncOutcome> {
    let mut tx = begin_monitored(orchestrator.db(), "sync::social_links").await?;

    let artist = load_artist(tx.conn(), artist_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Artist {} not found", artist_id)))?;

    let mut links = artist.social_links();
    let existing: Vec<SocialLink> = links
        .iter()
        .map(|(platform, url)| SocialLink {
            platform: platform.clone(),
            url: url.clone(),
        })
        .collect();

    let plan = reconcile(&existing, fetched, strategy);

    let mut outcome = SyncOutcome::new(artist_id);
    outcome.unchanged = plan.unchanged;
    outcome.removed = plan.remove.len();
    outcome.updated = plan.update.len();
    outcome.added = plan.insert.len();

    if !plan.is_empty() {
        for link in &plan.remove {
            links.remove(&link.platform);
        }
        for link in plan.update.into_iter().chain(plan.insert) {
            links.insert(link.platform, link.url);
        }
        update_social_links(tx.conn(), artist_id, &serde_json::to_string(&links)?).await?;
    }

    mark_synced(tx.conn(), SyncKind::SocialLinks, artist_id).await?;
    tx.commit().await?;

    Ok(outcome)
}
