//! MusicBrainz API client
//!
//! Discography via release-group browsing and social links via artist URL
//! relations. MusicBrainz allows 1 request/second per client and requires a
//! descriptive User-Agent.

use crate::services::sources::{
    error_for_status, AlbumType, DiscographySource, ReleaseEntry, SocialLink, SocialLinkSource,
    SourceError,
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const COVER_ART_BASE_URL: &str = "https://coverartarchive.org/release-group";
const USER_AGENT: &str = concat!(
    "HallyuHub-Sync/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/hallyuhub/hallyuhub)"
);
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 10;

/// Secondary types that mark a release group as not part of the core discography
const EXCLUDED_SECONDARY_TYPES: [&str; 5] = ["Compilation", "Live", "Remix", "DJ-mix", "Mixtape/Street"];

/// Browse response for `release-group?artist=...`
#[derive(Debug, Deserialize)]
struct MBReleaseGroupPage {
    #[serde(rename = "release-group-count", default)]
    count: usize,
    #[serde(rename = "release-groups", default)]
    release_groups: Vec<MBReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct MBReleaseGroup {
    id: String,
    title: String,
    #[serde(rename = "primary-type")]
    primary_type: Option<String>,
    #[serde(rename = "secondary-types", default)]
    secondary_types: Vec<String>,
    #[serde(rename = "first-release-date")]
    first_release_date: Option<String>,
}

/// Artist lookup with `inc=url-rels`
#[derive(Debug, Deserialize)]
struct MBArtistWithUrls {
    #[serde(default)]
    relations: Vec<MBUrlRelation>,
}

#[derive(Debug, Deserialize)]
struct MBUrlRelation {
    url: Option<MBUrl>,
}

#[derive(Debug, Deserialize)]
struct MBUrl {
    resource: String,
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: MUSICBRAINZ_BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(NonZeroU32::MIN)),
        })
    }

    /// Point the client at a mirror
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path_and_query: &str,
        what: &str,
    ) -> Result<T, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        tracing::debug!(url = %url, "Querying MusicBrainz API");

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, what).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl DiscographySource for MusicBrainzClient {
    async fn fetch_discography(&self, artist_mbid: &str) -> Result<Vec<ReleaseEntry>, SourceError> {
        let what = format!("MusicBrainz artist {}", artist_mbid);
        let label = what.as_str();
        let groups = browse_release_groups(label, |offset| {
            let path = format!(
                "/release-group?artist={}&limit={}&offset={}&fmt=json",
                artist_mbid, PAGE_SIZE, offset
            );
            async move { self.get_json::<MBReleaseGroupPage>(&path, label).await }
        })
        .await?;

        let entries: Vec<ReleaseEntry> = groups.into_iter().filter_map(release_entry).collect();

        tracing::debug!(
            artist_mbid = %artist_mbid,
            releases = entries.len(),
            "Retrieved discography from MusicBrainz"
        );
        Ok(entries)
    }
}

#[async_trait]
impl SocialLinkSource for MusicBrainzClient {
    async fn fetch_social_links(&self, artist_mbid: &str) -> Result<Vec<SocialLink>, SourceError> {
        let artist: MBArtistWithUrls = self
            .get_json(
                &format!("/artist/{}?inc=url-rels&fmt=json", artist_mbid),
                &format!("MusicBrainz artist {}", artist_mbid),
            )
            .await?;

        Ok(social_links_from_urls(
            artist.relations.into_iter().filter_map(|r| r.url).map(|u| u.resource),
        ))
    }
}

/// Collect every release group page by page, starting each page at the
/// number of groups seen so far
///
/// Hitting `MAX_PAGES` before the reported total is an error; a partial list
/// never reaches reconciliation.
async fn browse_release_groups<F, Fut>(what: &str, mut fetch_page: F) -> Result<Vec<MBReleaseGroup>, SourceError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<MBReleaseGroupPage, SourceError>>,
{
    let mut groups = Vec::new();
    let mut total = 0;

    for _ in 0..MAX_PAGES {
        let page = fetch_page(groups.len()).await?;
        total = page.count;
        let fetched = page.release_groups.len();
        groups.extend(page.release_groups);

        if fetched == 0 || groups.len() >= total {
            return Ok(groups);
        }
    }

    tracing::warn!(
        what,
        fetched = groups.len(),
        total,
        "Release group listing hit the page cap"
    );
    Err(SourceError::Incomplete {
        what: what.to_string(),
        fetched: groups.len(),
        total,
    })
}

/// Map a release group to a catalog release, skipping non-core releases
fn release_entry(group: MBReleaseGroup) -> Option<ReleaseEntry> {
    let album_type = match group.primary_type.as_deref()? {
        "Album" => AlbumType::Album,
        "EP" => AlbumType::Ep,
        "Single" => AlbumType::Single,
        _ => return None,
    };

    if group
        .secondary_types
        .iter()
        .any(|t| EXCLUDED_SECONDARY_TYPES.contains(&t.as_str()))
    {
        return None;
    }

    let title = group.title.trim().to_string();
    if title.is_empty() {
        return None;
    }

    Some(ReleaseEntry {
        cover_url: Some(format!("{}/{}/front", COVER_ART_BASE_URL, group.id)),
        mbid: group.id,
        title,
        album_type,
        release_date: group.first_release_date.filter(|d| !d.trim().is_empty()),
    })
}

/// Recognised social platforms; first link per platform wins
fn social_links_from_urls(urls: impl IntoIterator<Item = String>) -> Vec<SocialLink> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter_map(|url| {
            let platform = platform_for_url(&url)?;
            seen.insert(platform).then(|| SocialLink {
                platform: platform.to_string(),
                url,
            })
        })
        .collect()
}

/// Platform name for a profile URL, by host
pub fn platform_for_url(url: &str) -> Option<&'static str> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);

    match host {
        "instagram.com" => Some("instagram"),
        "twitter.com" | "x.com" => Some("twitter"),
        "youtube.com" | "youtu.be" => Some("youtube"),
        "tiktok.com" => Some("tiktok"),
        "facebook.com" => Some("facebook"),
        "weibo.com" => Some("weibo"),
        "open.spotify.com" => Some("spotify"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_groups_filtered_and_typed() {
        let page: MBReleaseGroupPage = serde_json::from_str(
            r#"{
                "release-group-count": 4,
                "release-group-offset": 0,
                "release-groups": [
                    {"id": "rg-1", "title": "The Album", "primary-type": "Album",
                     "secondary-types": [], "first-release-date": "2020-10-02"},
                    {"id": "rg-2", "title": "Square Up", "primary-type": "EP",
                     "secondary-types": [], "first-release-date": ""},
                    {"id": "rg-3", "title": "Hits", "primary-type": "Album",
                     "secondary-types": ["Compilation"]},
                    {"id": "rg-4", "title": "Interview", "primary-type": "Other"}
                ]
            }"#,
        )
        .unwrap();

        let entries: Vec<ReleaseEntry> =
            page.release_groups.into_iter().filter_map(release_entry).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].album_type, AlbumType::Album);
        assert_eq!(entries[0].release_date.as_deref(), Some("2020-10-02"));
        assert_eq!(
            entries[0].cover_url.as_deref(),
            Some("https://coverartarchive.org/release-group/rg-1/front")
        );
        assert_eq!(entries[1].album_type, AlbumType::Ep);
        assert_eq!(entries[1].release_date, None);
    }

    fn group_page(total: usize, offset: usize, len: usize) -> MBReleaseGroupPage {
        MBReleaseGroupPage {
            count: total,
            release_groups: (offset..offset + len)
                .map(|n| MBReleaseGroup {
                    id: format!("rg-{}", n),
                    title: format!("Release {}", n),
                    primary_type: Some("Album".to_string()),
                    secondary_types: Vec::new(),
                    first_release_date: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_browse_follows_offsets_to_total() {
        let mut offsets = Vec::new();

        let groups = browse_release_groups("artist", |offset| {
            offsets.push(offset);
            let len = PAGE_SIZE.min(250 - offset);
            async move { Ok(group_page(250, offset, len)) }
        })
        .await
        .unwrap();

        assert_eq!(groups.len(), 250);
        assert_eq!(offsets, vec![0, 100, 200]);
        assert_eq!(groups[249].id, "rg-249");
    }

    #[tokio::test]
    async fn test_browse_past_page_cap_is_an_error() {
        let total = PAGE_SIZE * MAX_PAGES + 1;
        let mut calls = 0;

        let result = browse_release_groups("artist", |offset| {
            calls += 1;
            async move { Ok(group_page(total, offset, PAGE_SIZE)) }
        })
        .await;

        assert_eq!(calls, MAX_PAGES);
        match result {
            Err(SourceError::Incomplete { fetched, total: reported, .. }) => {
                assert_eq!(fetched, PAGE_SIZE * MAX_PAGES);
                assert_eq!(reported, total);
            }
            other => panic!("expected Incomplete, got {:?}", other.map(|g| g.len())),
        }
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(platform_for_url("https://www.instagram.com/blackpinkofficial/"), Some("instagram"));
        assert_eq!(platform_for_url("https://x.com/ygofficialblink"), Some("twitter"));
        assert_eq!(platform_for_url("https://m.youtube.com/@BLACKPINK"), Some("youtube"));
        assert_eq!(platform_for_url("https://open.spotify.com/artist/41MozSoPIsD1dJM0CLPjZF"), Some("spotify"));
        assert_eq!(platform_for_url("https://www.discogs.com/artist/1"), None);
        assert_eq!(platform_for_url("not a url"), None);
    }

    #[test]
    fn test_first_link_per_platform_wins() {
        let links = social_links_from_urls(vec![
            "https://twitter.com/first".to_string(),
            "https://x.com/second".to_string(),
            "https://www.wikidata.org/wiki/Q1".to_string(),
            "https://instagram.com/official".to_string(),
        ]);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://twitter.com/first");
        assert_eq!(links[1].platform, "instagram");
    }
}
