//! Bootstrap configuration loading and root folder resolution
//!
//! Two-tier configuration:
//! 1. **TOML bootstrap**: root folder, port, logging, API keys, job tuning
//! 2. **Database runtime**: `settings` table (API keys entered at runtime)
//!
//! Missing TOML files are not fatal: a warning is logged and built-in
//! defaults are used.

use crate::types::MergeStrategy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "HALLYU_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "hallyu.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the SQLite database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP control-plane port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// TMDB v3 API key (lowest priority source)
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub duplicates: DuplicateConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            tmdb_api_key: None,
            sync: SyncConfig::default(),
            duplicates: DuplicateConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Batch sync tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Entities processed concurrently within one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum entities picked per batch run
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Run every sync kind periodically while serving (disabled when unset)
    #[serde(default)]
    pub schedule_interval_secs: Option<u64>,

    /// Attempts per external fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_tmdb_rps")]
    pub tmdb_requests_per_second: u32,

    #[serde(default)]
    pub default_strategy: MergeStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_limit: default_batch_limit(),
            schedule_interval_secs: None,
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            tmdb_requests_per_second: default_tmdb_rps(),
            default_strategy: MergeStrategy::default(),
        }
    }
}

/// Duplicate detection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// Cap on artists entering the quadratic name comparison
    #[serde(default = "default_name_sample_cap")]
    pub name_sample_cap: usize,

    /// Minimum normalized length of the shorter name in a containment match
    #[serde(default = "default_min_name_length")]
    pub min_name_length: usize,

    /// Jaro-Winkler similarity needed for a low-confidence match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            name_sample_cap: default_name_sample_cap(),
            min_name_length: default_min_name_length(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

fn default_port() -> u16 {
    5740
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_concurrency() -> usize {
    3
}

fn default_batch_limit() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_tmdb_rps() -> u32 {
    4
}

fn default_name_sample_cap() -> usize {
    500
}

fn default_min_name_length() -> usize {
    2
}

fn default_fuzzy_threshold() -> f64 {
    0.92
}

/// Default TOML location: `<config dir>/hallyu/hallyu-sync.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hallyu").join("hallyu-sync.toml"))
}

/// Load the bootstrap TOML file
///
/// A missing file yields defaults with a warning; an unreadable or malformed
/// file is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using built-in defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    config.validate()?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

impl TomlConfig {
    /// Reject values that would stall or break job execution
    pub fn validate(&self) -> Result<()> {
        if self.sync.concurrency == 0 {
            return Err(Error::Config("sync.concurrency must be at least 1".to_string()));
        }
        if self.sync.max_attempts == 0 {
            return Err(Error::Config("sync.max_attempts must be at least 1".to_string()));
        }
        if self.sync.tmdb_requests_per_second == 0 {
            return Err(Error::Config(
                "sync.tmdb_requests_per_second must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.duplicates.fuzzy_threshold) {
            return Err(Error::Config(
                "duplicates.fuzzy_threshold must be within 0.0-1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument
/// 2. `HALLYU_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hallyu"))
        .unwrap_or_else(|| PathBuf::from("./hallyu_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}
