//! Configuration resolution for hallyu-sync
//!
//! The TMDB API key is resolved with Database → ENV → TOML priority.

use hallyu_common::config::TomlConfig;
use hallyu_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable holding the TMDB API key
pub const TMDB_API_KEY_ENV: &str = "HALLYU_TMDB_API_KEY";

/// Resolve the TMDB API key from the three configuration tiers
///
/// **Priority:** Database → ENV → TOML
///
/// Returns `None` when no tier has a usable key; TMDB-backed syncs then fail
/// per entity with a missing-credentials error while MusicBrainz syncs work.
pub async fn resolve_tmdb_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_tmdb_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(TMDB_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .tmdb_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "TMDB API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_key.or(env_key).or(toml_key);
    match sources.first() {
        Some(source) => info!("TMDB API key loaded from {}", source),
        None => warn!(
            "TMDB API key not configured; filmography and cast syncs will fail. \
             Set {} or tmdb_api_key in the TOML config",
            TMDB_API_KEY_ENV
        ),
    }

    Ok(resolved)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hallyu_common::db::init_memory_database;
    use serial_test::serial;

    fn toml_with_key(key: Option<&str>) -> TomlConfig {
        TomlConfig {
            tmdb_api_key: key.map(str::to_string),
            ..TomlConfig::default()
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_database_key_wins() {
        let pool = init_memory_database().await.unwrap();
        crate::db::settings::set_tmdb_api_key(&pool, "db-key".to_string())
            .await
            .unwrap();
        std::env::set_var(TMDB_API_KEY_ENV, "env-key");

        let key = resolve_tmdb_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();

        std::env::remove_var(TMDB_API_KEY_ENV);
        assert_eq!(key.as_deref(), Some("db-key"));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_key_beats_toml() {
        let pool = init_memory_database().await.unwrap();
        std::env::set_var(TMDB_API_KEY_ENV, "env-key");

        let key = resolve_tmdb_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();

        std::env::remove_var(TMDB_API_KEY_ENV);
        assert_eq!(key.as_deref(), Some("env-key"));
    }

    #[tokio::test]
    #[serial]
    async fn test_blank_keys_ignored() {
        let pool = init_memory_database().await.unwrap();
        std::env::set_var(TMDB_API_KEY_ENV, "  ");

        let key = resolve_tmdb_api_key(&pool, &toml_with_key(Some("")))
            .await
            .unwrap();

        std::env::remove_var(TMDB_API_KEY_ENV);
        assert_eq!(key, None);
    }

    #[tokio::test]
    #[serial]
    async fn test_toml_key_used_last() {
        let pool = init_memory_database().await.unwrap();
        std::env::remove_var(TMDB_API_KEY_ENV);

        let key = resolve_tmdb_api_key(&pool, &toml_with_key(Some("toml-key")))
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some("toml-key"));
    }
}
