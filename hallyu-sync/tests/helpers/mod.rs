//! Test Helper Utilities
//!
//! Shared fixtures for hallyu-sync integration tests: an in-memory catalog,
//! canned external sources and seeding shortcuts.

#![allow(dead_code)]

use async_trait::async_trait;
use hallyu_common::config::TomlConfig;
use hallyu_common::db::{init_memory_database, Artist, Production};
use hallyu_common::events::EventBus;
use hallyu_sync::db::artists::insert_artist;
use hallyu_sync::db::productions::insert_production;
use hallyu_sync::services::sources::{
    AlbumType, CastEntry, CastSource, CreditEntry, DiscographySource, FilmographySource,
    MediaType, ReleaseEntry, SocialLink, SocialLinkSource, SourceError, Sources,
};
use hallyu_sync::AppState;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Canned TMDB / MusicBrainz responses keyed by external id
///
/// Unknown ids answer `NotFound`, which is not retried.
#[derive(Default)]
pub struct FakeCatalog {
    filmographies: Mutex<HashMap<i64, Vec<CreditEntry>>>,
    discographies: Mutex<HashMap<String, Vec<ReleaseEntry>>>,
    social_links: Mutex<HashMap<String, Vec<SocialLink>>>,
    casts: Mutex<HashMap<i64, Vec<CastEntry>>>,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_filmography(&self, person_tmdb_id: i64, credits: Vec<CreditEntry>) {
        self.filmographies.lock().unwrap().insert(person_tmdb_id, credits);
    }

    pub fn set_discography(&self, artist_mbid: &str, releases: Vec<ReleaseEntry>) {
        self.discographies
            .lock()
            .unwrap()
            .insert(artist_mbid.to_string(), releases);
    }

    pub fn set_social_links(&self, artist_mbid: &str, links: Vec<SocialLink>) {
        self.social_links
            .lock()
            .unwrap()
            .insert(artist_mbid.to_string(), links);
    }

    pub fn set_cast(&self, production_tmdb_id: i64, cast: Vec<CastEntry>) {
        self.casts.lock().unwrap().insert(production_tmdb_id, cast);
    }

    pub fn sources(self: &Arc<Self>) -> Sources {
        Sources {
            filmography: self.clone(),
            discography: self.clone(),
            social_links: self.clone(),
            cast: self.clone(),
        }
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FilmographySource for FakeCatalog {
    async fn fetch_filmography(&self, person_tmdb_id: i64) -> Result<Vec<CreditEntry>, SourceError> {
        self.record_call();
        self.filmographies
            .lock()
            .unwrap()
            .get(&person_tmdb_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("person {}", person_tmdb_id)))
    }
}

#[async_trait]
impl DiscographySource for FakeCatalog {
    async fn fetch_discography(&self, artist_mbid: &str) -> Result<Vec<ReleaseEntry>, SourceError> {
        self.record_call();
        self.discographies
            .lock()
            .unwrap()
            .get(artist_mbid)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("artist {}", artist_mbid)))
    }
}

#[async_trait]
impl SocialLinkSource for FakeCatalog {
    async fn fetch_social_links(&self, artist_mbid: &str) -> Result<Vec<SocialLink>, SourceError> {
        self.record_call();
        self.social_links
            .lock()
            .unwrap()
            .get(artist_mbid)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("artist {}", artist_mbid)))
    }
}

#[async_trait]
impl CastSource for FakeCatalog {
    async fn fetch_cast(
        &self,
        _media_type: MediaType,
        production_tmdb_id: i64,
    ) -> Result<Vec<CastEntry>, SourceError> {
        self.record_call();
        self.casts
            .lock()
            .unwrap()
            .get(&production_tmdb_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("production {}", production_tmdb_id)))
    }
}

/// Config with a single fetch attempt so failures surface immediately
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.sync.max_attempts = 1;
    config.sync.base_delay_ms = 1;
    config.sync.max_delay_ms = 1;
    config
}

/// App state over a fresh in-memory catalog and the given fake sources
pub async fn test_state(catalog: &Arc<FakeCatalog>) -> AppState {
    let db = init_memory_database().await.unwrap();
    AppState::new(db, EventBus::new(100), test_config(), catalog.sources())
}

pub async fn seed_artist(pool: &SqlitePool, artist: &Artist) {
    let mut conn = pool.acquire().await.unwrap();
    insert_artist(&mut conn, artist).await.unwrap();
}

/// Artist with a TMDB person id
pub fn actor(id: &str, name: &str, tmdb_id: i64) -> Artist {
    let mut artist = Artist::new(id, name);
    artist.tmdb_id = Some(tmdb_id);
    artist
}

/// Artist with a MusicBrainz id
pub fn singer(id: &str, name: &str, mbid: &str) -> Artist {
    let mut artist = Artist::new(id, name);
    artist.mbid = Some(mbid.to_string());
    artist
}

pub async fn seed_production(pool: &SqlitePool, id: &str, title: &str, tmdb_id: i64, media_type: MediaType) {
    let production = Production {
        id: id.to_string(),
        title: title.to_string(),
        original_title: None,
        media_type: media_type.as_str().to_string(),
        tmdb_id: Some(tmdb_id),
        release_year: None,
        cast_synced_at: None,
    };
    let mut conn = pool.acquire().await.unwrap();
    insert_production(&mut conn, &production).await.unwrap();
}

pub async fn execute(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}

pub fn credit(tmdb_id: i64, title: &str, character: Option<&str>) -> CreditEntry {
    CreditEntry {
        production_tmdb_id: tmdb_id,
        media_type: MediaType::Tv,
        title: title.to_string(),
        original_title: None,
        release_year: Some(2022),
        character_name: character.map(str::to_string),
        sort_order: None,
    }
}

pub fn release(mbid: &str, title: &str, cover: Option<&str>) -> ReleaseEntry {
    ReleaseEntry {
        mbid: mbid.to_string(),
        title: title.to_string(),
        album_type: AlbumType::Album,
        release_date: Some("2022-09-16".to_string()),
        cover_url: cover.map(str::to_string),
    }
}

pub fn link(platform: &str, url: &str) -> SocialLink {
    SocialLink {
        platform: platform.to_string(),
        url: url.to_string(),
    }
}

pub fn cast_member(person_tmdb_id: i64, name: &str, character: Option<&str>) -> CastEntry {
    CastEntry {
        person_tmdb_id,
        name: name.to_string(),
        character_name: character.map(str::to_string),
        sort_order: Some(0),
    }
}
