//! External data sources for the sync jobs
//!
//! Each sync talks to its source through a trait so that the TMDB and
//! MusicBrainz clients can be swapped for fakes in tests. Entries returned by
//! sources are already normalized into the catalog's vocabulary.

use crate::services::merge_strategy::Reconcilable;
use crate::utils::Retryable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// External API errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Listing stopped at the page cap before reaching the reported total
    #[error("Incomplete listing for {what}: {fetched} of {total} entries")]
    Incomplete {
        what: String,
        fetched: usize,
        total: usize,
    },
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        match self {
            SourceError::RateLimited { .. } | SourceError::Network(_) => true,
            SourceError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to a [`SourceError`]
pub(crate) async fn error_for_status(response: reqwest::Response, what: &str) -> SourceError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    match status.as_u16() {
        404 => SourceError::NotFound(what.to_string()),
        // MusicBrainz answers 503 when its rate limit is hit
        429 | 503 => SourceError::RateLimited { retry_after },
        401 | 403 => SourceError::MissingCredentials(format!("{} rejected credentials", what)),
        code => SourceError::Api {
            status: code,
            message: response.text().await.unwrap_or_default(),
        },
    }
}

/// Production media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(format!("unknown media type: {}", other)),
        }
    }
}

/// One production credit of an artist, keyed by media type and TMDB id
///
/// TMDB numbers movies and TV shows independently, so the id alone is not
/// unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub production_tmdb_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub original_title: Option<String>,
    pub release_year: Option<i64>,
    pub character_name: Option<String>,
    pub sort_order: Option<i64>,
}

impl CreditEntry {
    pub fn production_key(&self) -> (MediaType, i64) {
        (self.media_type, self.production_tmdb_id)
    }
}

impl Reconcilable for CreditEntry {
    type Key = (MediaType, i64);

    fn key(&self) -> (MediaType, i64) {
        self.production_key()
    }

    fn fill_missing_from(&mut self, other: &Self) -> bool {
        let mut changed = fill_string(&mut self.character_name, &other.character_name);
        if self.sort_order.is_none() && other.sort_order.is_some() {
            self.sort_order = other.sort_order;
            changed = true;
        }
        changed
    }
}

/// Album kind stored in `albums.album_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlbumType {
    Album,
    Ep,
    Single,
}

impl AlbumType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumType::Album => "ALBUM",
            AlbumType::Ep => "EP",
            AlbumType::Single => "SINGLE",
        }
    }
}

impl FromStr for AlbumType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALBUM" => Ok(AlbumType::Album),
            "EP" => Ok(AlbumType::Ep),
            "SINGLE" => Ok(AlbumType::Single),
            other => Err(format!("unknown album type: {}", other)),
        }
    }
}

/// One release of an artist, keyed by its MusicBrainz release-group id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub mbid: String,
    pub title: String,
    pub album_type: AlbumType,
    pub release_date: Option<String>,
    pub cover_url: Option<String>,
}

impl Reconcilable for ReleaseEntry {
    type Key = String;

    fn key(&self) -> String {
        self.mbid.clone()
    }

    fn fill_missing_from(&mut self, other: &Self) -> bool {
        let date = fill_string(&mut self.release_date, &other.release_date);
        let cover = fill_string(&mut self.cover_url, &other.cover_url);
        date || cover
    }
}

/// Social profile link, keyed by platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

impl Reconcilable for SocialLink {
    type Key = String;

    fn key(&self) -> String {
        self.platform.clone()
    }

    fn fill_missing_from(&mut self, other: &Self) -> bool {
        if self.url.trim().is_empty() && !other.url.trim().is_empty() {
            self.url = other.url.clone();
            return true;
        }
        false
    }
}

/// Cast member of a production, keyed by the person's TMDB id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastEntry {
    pub person_tmdb_id: i64,
    pub name: String,
    pub character_name: Option<String>,
    pub sort_order: Option<i64>,
}

impl Reconcilable for CastEntry {
    type Key = i64;

    fn key(&self) -> i64 {
        self.person_tmdb_id
    }

    fn fill_missing_from(&mut self, other: &Self) -> bool {
        let mut changed = fill_string(&mut self.character_name, &other.character_name);
        if self.sort_order.is_none() && other.sort_order.is_some() {
            self.sort_order = other.sort_order;
            changed = true;
        }
        changed
    }
}

/// Fill an empty optional string from `other`; true if filled
fn fill_string(target: &mut Option<String>, other: &Option<String>) -> bool {
    let empty = target.as_deref().map_or(true, |s| s.trim().is_empty());
    match other {
        Some(value) if empty && !value.trim().is_empty() => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

#[async_trait]
pub trait FilmographySource: Send + Sync {
    /// Acting credits of a person
    async fn fetch_filmography(&self, person_tmdb_id: i64) -> Result<Vec<CreditEntry>, SourceError>;
}

#[async_trait]
pub trait DiscographySource: Send + Sync {
    /// Release groups credited to an artist
    async fn fetch_discography(&self, artist_mbid: &str) -> Result<Vec<ReleaseEntry>, SourceError>;
}

#[async_trait]
pub trait SocialLinkSource: Send + Sync {
    async fn fetch_social_links(&self, artist_mbid: &str) -> Result<Vec<SocialLink>, SourceError>;
}

#[async_trait]
pub trait CastSource: Send + Sync {
    async fn fetch_cast(
        &self,
        media_type: MediaType,
        production_tmdb_id: i64,
    ) -> Result<Vec<CastEntry>, SourceError>;
}

/// The set of sources a sync service draws from
#[derive(Clone)]
pub struct Sources {
    pub filmography: Arc<dyn FilmographySource>,
    pub discography: Arc<dyn DiscographySource>,
    pub social_links: Arc<dyn SocialLinkSource>,
    pub cast: Arc<dyn CastSource>,
}
