//! Shared vocabulary for sync jobs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How fetched external data is reconciled against rows already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Drop every existing source-tracked row and insert the fetched set
    ReplaceAll,
    /// Only add fetched rows whose key is not stored yet
    Incremental,
    /// Add new rows and fill empty fields of existing rows, never overwriting
    #[default]
    Merge,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::ReplaceAll => "replace_all",
            MergeStrategy::Incremental => "incremental",
            MergeStrategy::Merge => "merge",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "replace_all" | "replace" => Ok(MergeStrategy::ReplaceAll),
            "incremental" | "add" => Ok(MergeStrategy::Incremental),
            "merge" => Ok(MergeStrategy::Merge),
            other => Err(format!("unknown merge strategy: {}", other)),
        }
    }
}

/// Which enrichment job a sync run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Artist production credits from TMDB
    Filmography,
    /// Artist albums from MusicBrainz
    Discography,
    /// Artist social profiles from MusicBrainz URL relations
    SocialLinks,
    /// Production cast from TMDB
    Cast,
}

impl SyncKind {
    pub const ALL: [SyncKind; 4] = [
        SyncKind::Filmography,
        SyncKind::Discography,
        SyncKind::SocialLinks,
        SyncKind::Cast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Filmography => "filmography",
            SyncKind::Discography => "discography",
            SyncKind::SocialLinks => "social_links",
            SyncKind::Cast => "cast",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "filmography" => Ok(SyncKind::Filmography),
            "discography" => Ok(SyncKind::Discography),
            "social_links" | "social" => Ok(SyncKind::SocialLinks),
            "cast" => Ok(SyncKind::Cast),
            other => Err(format!("unknown sync kind: {}", other)),
        }
    }
}
