//! Database row models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artist row
///
/// `stage_names` and `social_links` are JSON text columns; use the accessor
/// methods to decode them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artist {
    pub id: String,
    pub name_romanized: String,
    pub name_hangul: Option<String>,
    pub stage_names: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<i64>,
    pub place_of_birth: Option<String>,
    pub height_cm: Option<i64>,
    pub bio: Option<String>,
    pub primary_image_url: Option<String>,
    pub agency_id: Option<String>,
    pub tmdb_id: Option<i64>,
    pub mbid: Option<String>,
    pub social_links: Option<String>,
    pub view_count: i64,
    pub favorite_count: i64,
    pub filmography_synced_at: Option<String>,
    pub discography_synced_at: Option<String>,
    pub social_links_synced_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Artist {
    /// New artist with only a romanized name set
    pub fn new(id: impl Into<String>, name_romanized: impl Into<String>) -> Self {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            id: id.into(),
            name_romanized: name_romanized.into(),
            name_hangul: None,
            stage_names: None,
            birth_date: None,
            gender: None,
            place_of_birth: None,
            height_cm: None,
            bio: None,
            primary_image_url: None,
            agency_id: None,
            tmdb_id: None,
            mbid: None,
            social_links: None,
            view_count: 0,
            favorite_count: 0,
            filmography_synced_at: None,
            discography_synced_at: None,
            social_links_synced_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Decoded stage names; malformed JSON decodes as empty
    pub fn stage_names(&self) -> Vec<String> {
        decode_json_or_default(self.stage_names.as_deref())
    }

    /// Decoded social links keyed by platform; malformed JSON decodes as empty
    pub fn social_links(&self) -> BTreeMap<String, String> {
        decode_json_or_default(self.social_links.as_deref())
    }
}

fn decode_json_or_default<T: serde::de::DeserializeOwned + Default>(raw: Option<&str>) -> T {
    match raw {
        Some(json) if !json.trim().is_empty() => match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed JSON column");
                T::default()
            }
        },
        _ => T::default(),
    }
}

/// Production (movie or TV series) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Production {
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub media_type: String,
    pub tmdb_id: Option<i64>,
    pub release_year: Option<i64>,
    pub cast_synced_at: Option<String>,
}

/// Album row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub title: String,
    pub album_type: String,
    pub release_date: Option<String>,
    pub mbid: Option<String>,
    pub cover_url: Option<String>,
}
