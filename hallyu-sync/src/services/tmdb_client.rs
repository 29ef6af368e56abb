//! TMDB API client
//!
//! Person filmography (`/person/{id}/combined_credits`) and production cast
//! (`/{movie|tv}/{id}/credits`), rate limited with `governor`.

use crate::services::sources::{
    error_for_status, CastEntry, CastSource, CreditEntry, FilmographySource, MediaType, SourceError,
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const USER_AGENT: &str = concat!("HallyuHub-Sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TmdbCombinedCredits {
    #[serde(default)]
    cast: Vec<TmdbCastCredit>,
}

/// Entry of a person's `combined_credits.cast`
#[derive(Debug, Deserialize)]
struct TmdbCastCredit {
    id: i64,
    media_type: Option<String>,
    /// Movies use `title`, TV uses `name`
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    character: Option<String>,
    order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Deserialize)]
struct TmdbCastMember {
    id: i64,
    name: String,
    character: Option<String>,
    order: Option<i64>,
}

/// TMDB API client
pub struct TmdbClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl TmdbClient {
    /// Create a client; without an API key every request fails with
    /// [`SourceError::MissingCredentials`].
    pub fn new(api_key: Option<String>, requests_per_second: u32) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: TMDB_BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    /// Point the client at another TMDB-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<T, SourceError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SourceError::MissingCredentials("TMDB API key not configured".to_string())
        })?;

        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying TMDB API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", api_key)])
            .send()
            .await?;

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
impl FilmographySource for TmdbClient {
    async fn fetch_filmography(&self, person_tmdb_id: i64) -> Result<Vec<CreditEntry>, SourceError> {
        let credits: TmdbCombinedCredits = self
            .get_json(
                &format!("/person/{}/combined_credits", person_tmdb_id),
                &format!("TMDB person {}", person_tmdb_id),
            )
            .await?;

        let entries = normalize_filmography(credits.cast);
        tracing::debug!(
            person_tmdb_id,
            credits = entries.len(),
            "Retrieved filmography from TMDB"
        );
        Ok(entries)
    }
}

#[async_trait]
impl CastSource for TmdbClient {
    async fn fetch_cast(
        &self,
        media_type: MediaType,
        production_tmdb_id: i64,
    ) -> Result<Vec<CastEntry>, SourceError> {
        let credits: TmdbCredits = self
            .get_json(
                &format!("/{}/{}/credits", media_type, production_tmdb_id),
                &format!("TMDB {} {}", media_type, production_tmdb_id),
            )
            .await?;

        Ok(credits
            .cast
            .into_iter()
            .map(|member| CastEntry {
                person_tmdb_id: member.id,
                name: member.name,
                character_name: non_blank(member.character),
                sort_order: member.order,
            })
            .collect())
    }
}

/// Convert raw combined credits into catalog credit entries
///
/// Drops entries without a usable media type or title, and appearances as
/// oneself (variety shows, award ceremonies, documentaries).
fn normalize_filmography(cast: Vec<TmdbCastCredit>) -> Vec<CreditEntry> {
    cast.into_iter()
        .filter_map(|credit| {
            let media_type = credit.media_type.as_deref()?.parse::<MediaType>().ok()?;

            if credit.character.as_deref().is_some_and(is_self_appearance) {
                return None;
            }

            let (title, original_title, date) = match media_type {
                MediaType::Movie => (credit.title, credit.original_title, credit.release_date),
                MediaType::Tv => (credit.name, credit.original_name, credit.first_air_date),
            };
            let title = non_blank(title)?;

            Some(CreditEntry {
                production_tmdb_id: credit.id,
                media_type,
                title,
                original_title: non_blank(original_title),
                release_year: date.as_deref().and_then(year_of),
                character_name: non_blank(credit.character),
                sort_order: credit.order,
            })
        })
        .collect()
}

/// "Self", "Himself - Host", "Herself (Guest)" and similar
pub fn is_self_appearance(character: &str) -> bool {
    let lowered = character.trim().to_lowercase();
    ["self", "himself", "herself", "themselves"]
        .iter()
        .any(|word| {
            lowered == *word
                || lowered
                    .strip_prefix(word)
                    .is_some_and(|rest| rest.starts_with([' ', '-', '(', ',']))
        })
}

/// Year of a `YYYY-MM-DD` date
fn year_of(date: &str) -> Option<i64> {
    date.get(..4).and_then(|y| y.parse().ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_cast(json: &str) -> Vec<CreditEntry> {
        let credits: TmdbCombinedCredits = serde_json::from_str(json).unwrap();
        normalize_filmography(credits.cast)
    }

    #[test]
    fn test_normalizes_movie_and_tv_credits() {
        let entries = parse_cast(
            r#"{"cast": [
                {"id": 10, "media_type": "tv", "name": "Descendants of the Sun",
                 "original_name": "태양의 후예", "first_air_date": "2016-02-24",
                 "character": "Kang Mo-yeon", "episode_count": 16},
                {"id": 20, "media_type": "movie", "title": "Parasite",
                 "original_title": "기생충", "release_date": "2019-05-30",
                 "character": "Kim Ki-jung", "order": 3}
            ]}"#,
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].media_type, MediaType::Tv);
        assert_eq!(entries[0].title, "Descendants of the Sun");
        assert_eq!(entries[0].original_title.as_deref(), Some("태양의 후예"));
        assert_eq!(entries[0].release_year, Some(2016));
        assert_eq!(entries[1].production_tmdb_id, 20);
        assert_eq!(entries[1].sort_order, Some(3));
    }

    #[test]
    fn test_skips_self_appearances_and_untitled_entries() {
        let entries = parse_cast(
            r#"{"cast": [
                {"id": 1, "media_type": "tv", "name": "Running Man", "character": "Self - Guest"},
                {"id": 2, "media_type": "tv", "name": "Weekly Idol", "character": "Herself"},
                {"id": 3, "media_type": "movie", "title": "  ", "character": "Lead"},
                {"id": 4, "media_type": "person", "title": "Odd", "character": "Lead"},
                {"id": 5, "media_type": "movie", "title": "Selfie Story", "character": "Selina"}
            ]}"#,
        );

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].production_tmdb_id, 5);
    }

    #[test]
    fn test_self_appearance_detection() {
        assert!(is_self_appearance("Self"));
        assert!(is_self_appearance("Himself (Cameo)"));
        assert!(is_self_appearance("herself - MC"));
        assert!(!is_self_appearance("Selina"));
        assert!(!is_self_appearance("Kang Mo-yeon"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = TmdbClient::new(None, 4).unwrap();
        let result = client.fetch_filmography(1).await;
        assert!(matches!(result, Err(SourceError::MissingCredentials(_))));
    }
}
