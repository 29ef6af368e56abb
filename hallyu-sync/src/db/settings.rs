//! Settings database operations
//!
//! Get/set accessors over the `settings` key/value table.

use hallyu_common::{Error, Result};
use sqlx::{Pool, Sqlite};

const TMDB_API_KEY: &str = "tmdb_api_key";

/// Get TMDB API key from database
///
/// **Returns:** Some(key) if set and non-empty, None otherwise
pub async fn get_tmdb_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    Ok(get_setting::<String>(db, TMDB_API_KEY)
        .await?
        .filter(|key| !key.trim().is_empty()))
}

/// Store the TMDB API key; read by the next `serve` or `sync` start
pub async fn set_tmdb_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    if !crate::config::is_valid_key(&key) {
        return Err(Error::InvalidInput(
            "TMDB API key cannot be empty or whitespace-only".to_string(),
        ));
    }
    set_setting(db, TMDB_API_KEY, key.trim()).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
