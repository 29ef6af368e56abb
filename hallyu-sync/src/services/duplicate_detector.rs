//! Artist duplicate detection
//!
//! **Algorithm:**
//! 1. High confidence: artists sharing a TMDB id, a MusicBrainz id or a
//!    normalized native (Hangul) name are grouped.
//! 2. Medium confidence: within a bounded sample of the most recently created
//!    artists, every pair of normalized romanized names is compared; equal
//!    names or whole-word containment of the shorter name in the longer match.
//! 3. Low confidence: remaining sample pairs with Jaro-Winkler similarity at
//!    or above the configured threshold.
//!
//! Pairs already grouped at high confidence are not reported again.

use crate::services::name_normalizer::{contains_whole_words, normalize_name, normalize_native_name};
use hallyu_common::config::DuplicateConfig;
use hallyu_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Artist fields needed for matching and for picking the record to keep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArtistCandidate {
    pub id: String,
    pub name_romanized: String,
    pub name_hangul: Option<String>,
    pub tmdb_id: Option<i64>,
    pub mbid: Option<String>,
    pub created_at: String,
    /// Number of optional scalar fields that are set
    pub filled_fields: i64,
    /// Number of rows referencing the artist across relation tables
    pub relation_count: i64,
}

impl ArtistCandidate {
    pub fn completeness(&self) -> i64 {
        self.filled_fields + self.relation_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    SameTmdbId,
    SameMbid,
    SameNativeName,
    SameNormalizedName,
    NameContainment,
    SimilarName,
}

/// Artists believed to be the same person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub confidence: MatchConfidence,
    pub reason: MatchReason,
    /// 0.0-1.0
    pub score: f64,
    /// Shared value that triggered the match (id or normalized name)
    pub matched_on: String,
    pub artists: Vec<ArtistCandidate>,
    pub suggested_keep_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    /// Artists considered for identifier matching
    pub scanned: usize,
    /// Artists considered for name matching
    pub name_sample_size: usize,
    /// True when the sample cap excluded some artists from name matching
    pub truncated: bool,
}

/// Database-backed duplicate scan
pub struct DuplicateDetector {
    db: SqlitePool,
    config: DuplicateConfig,
}

impl DuplicateDetector {
    pub fn new(db: SqlitePool, config: DuplicateConfig) -> Self {
        Self { db, config }
    }

    pub async fn scan(&self) -> Result<DuplicateReport> {
        let candidates = crate::db::artists::load_duplicate_candidates(&self.db).await?;
        let report = detect_duplicates(&candidates, &self.config);

        tracing::info!(
            scanned = report.scanned,
            name_sample_size = report.name_sample_size,
            high = report.high_count,
            medium = report.medium_count,
            low = report.low_count,
            truncated = report.truncated,
            "Duplicate scan complete"
        );

        Ok(report)
    }
}

/// Find duplicate groups among `candidates`
pub fn detect_duplicates(candidates: &[ArtistCandidate], config: &DuplicateConfig) -> DuplicateReport {
    let mut groups = Vec::new();
    let mut seen_member_sets: HashSet<Vec<String>> = HashSet::new();
    let mut high_pairs: HashSet<(String, String)> = HashSet::new();

    // High confidence: shared identifiers, strongest reason first
    let keyed: [(MatchReason, f64, fn(&ArtistCandidate) -> Option<String>); 3] = [
        (MatchReason::SameTmdbId, 1.0, tmdb_key),
        (MatchReason::SameMbid, 1.0, mbid_key),
        (MatchReason::SameNativeName, 0.9, native_name_key),
    ];

    for (reason, score, key_of) in keyed.iter() {
        let mut buckets: BTreeMap<String, Vec<&ArtistCandidate>> = BTreeMap::new();
        for candidate in candidates {
            if let Some(key) = key_of(candidate) {
                buckets.entry(key).or_default().push(candidate);
            }
        }

        for (key, members) in buckets {
            if members.len() < 2 {
                continue;
            }

            let mut ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
            ids.sort();
            if !seen_member_sets.insert(ids.clone()) {
                continue;
            }

            for (i, a) in ids.iter().enumerate() {
                for b in &ids[i + 1..] {
                    high_pairs.insert((a.clone(), b.clone()));
                }
            }

            groups.push(make_group(
                MatchConfidence::High,
                *reason,
                *score,
                key,
                members.into_iter().cloned().collect(),
            ));
        }
    }

    // Bounded sample for quadratic name comparison, newest first
    let mut sample: Vec<&ArtistCandidate> = candidates.iter().collect();
    sample.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    let truncated = sample.len() > config.name_sample_cap;
    sample.truncate(config.name_sample_cap);

    let normalized: Vec<(&ArtistCandidate, String)> = sample
        .iter()
        .map(|a| (*a, normalize_name(&a.name_romanized)))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    for (i, (a, name_a)) in normalized.iter().enumerate() {
        for (b, name_b) in &normalized[i + 1..] {
            let pair = ordered_pair(&a.id, &b.id);
            if high_pairs.contains(&pair) {
                continue;
            }

            if let Some((confidence, reason, score)) = compare_names(name_a, name_b, config) {
                let (shorter, longer) = shorter_first(name_a, name_b);
                let matched_on = if shorter == longer {
                    shorter.to_string()
                } else {
                    format!("{} ~ {}", shorter, longer)
                };
                groups.push(make_group(
                    confidence,
                    reason,
                    score,
                    matched_on,
                    vec![(*a).clone(), (*b).clone()],
                ));
            }
        }
    }

    groups.sort_by(|a, b| {
        a.confidence
            .cmp(&b.confidence)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.suggested_keep_id.cmp(&b.suggested_keep_id))
    });

    let count = |c: MatchConfidence| groups.iter().filter(|g| g.confidence == c).count();

    DuplicateReport {
        high_count: count(MatchConfidence::High),
        medium_count: count(MatchConfidence::Medium),
        low_count: count(MatchConfidence::Low),
        scanned: candidates.len(),
        name_sample_size: sample.len(),
        truncated,
        groups,
    }
}

fn tmdb_key(artist: &ArtistCandidate) -> Option<String> {
    artist.tmdb_id.map(|id| id.to_string())
}

fn mbid_key(artist: &ArtistCandidate) -> Option<String> {
    artist
        .mbid
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_lowercase)
}

fn native_name_key(artist: &ArtistCandidate) -> Option<String> {
    artist
        .name_hangul
        .as_deref()
        .map(normalize_native_name)
        .filter(|n| !n.is_empty())
}

/// Order two names by character count, shorter first
fn shorter_first<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Score two normalized romanized names
fn compare_names(
    a: &str,
    b: &str,
    config: &DuplicateConfig,
) -> Option<(MatchConfidence, MatchReason, f64)> {
    let (shorter, longer) = shorter_first(a, b);

    if shorter.chars().count() < config.min_name_length {
        return None;
    }

    if shorter == longer {
        return Some((MatchConfidence::Medium, MatchReason::SameNormalizedName, 0.85));
    }

    let similarity = strsim::jaro_winkler(shorter, longer);

    if contains_whole_words(longer, shorter) {
        return Some((
            MatchConfidence::Medium,
            MatchReason::NameContainment,
            0.6 + 0.25 * similarity,
        ));
    }

    if similarity >= config.fuzzy_threshold {
        return Some((MatchConfidence::Low, MatchReason::SimilarName, 0.5 * similarity));
    }

    None
}

fn make_group(
    confidence: MatchConfidence,
    reason: MatchReason,
    score: f64,
    matched_on: String,
    artists: Vec<ArtistCandidate>,
) -> DuplicateGroup {
    let suggested_keep_id = suggest_keep(&artists)
        .map(|a| a.id.clone())
        .unwrap_or_default();

    DuplicateGroup {
        confidence,
        reason,
        score,
        matched_on,
        artists,
        suggested_keep_id,
    }
}

/// Most complete record; ties go to the oldest, then the smallest id
pub fn suggest_keep(artists: &[ArtistCandidate]) -> Option<&ArtistCandidate> {
    artists.iter().min_by(|a, b| {
        b.completeness()
            .cmp(&a.completeness())
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
