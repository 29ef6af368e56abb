//! Duplicate Detection Integration Tests

mod helpers;

use hallyu_common::config::DuplicateConfig;
use hallyu_common::db::Artist;
use hallyu_sync::services::{DuplicateDetector, MatchConfidence, MatchReason};
use helpers::*;
use sqlx::SqlitePool;

async fn seed_catalog(pool: &SqlitePool) {
    let mut iu = Artist::new("i1", "IU");
    iu.name_hangul = Some("아이유".to_string());
    seed_artist(pool, &iu).await;

    let mut lee = Artist::new("i2", "Lee Ji-eun");
    lee.name_hangul = Some("아 이 유".to_string());
    seed_artist(pool, &lee).await;

    seed_artist(pool, &Artist::new("j1", "Jung Hae In")).await;
    seed_artist(pool, &Artist::new("j2", "Jung Hae-in")).await;
    seed_artist(pool, &Artist::new("s1", "Kim Jisoo")).await;
    seed_artist(pool, &Artist::new("s2", "Jisoo")).await;
    seed_artist(pool, &Artist::new("t1", "Taeyeon")).await;

    execute(pool, "INSERT INTO users (id, email) VALUES ('u1', 'uaena@example.com')").await;
    execute(pool, "INSERT INTO user_favorites (user_id, artist_id) VALUES ('u1', 'i2')").await;
}

#[tokio::test]
async fn test_scan_groups_by_confidence() {
    let state = test_state(&FakeCatalog::new()).await;
    seed_catalog(&state.db).await;

    let report = DuplicateDetector::new(state.db.clone(), DuplicateConfig::default())
        .scan()
        .await
        .unwrap();

    assert_eq!(report.scanned, 7);
    assert_eq!(report.name_sample_size, 7);
    assert!(!report.truncated);
    assert_eq!(report.high_count, 1);
    assert_eq!(report.medium_count, 2);
    assert_eq!(report.low_count, 0);

    let high = &report.groups[0];
    assert_eq!(high.confidence, MatchConfidence::High);
    assert_eq!(high.reason, MatchReason::SameNativeName);
    assert_eq!(high.matched_on, "아이유");
    // The favorited record is more complete
    assert_eq!(high.suggested_keep_id, "i2");

    let reasons: Vec<MatchReason> = report.groups[1..].iter().map(|g| g.reason).collect();
    assert_eq!(
        reasons,
        vec![MatchReason::SameNormalizedName, MatchReason::NameContainment]
    );

    let containment = &report.groups[2];
    let mut ids: Vec<&str> = containment.artists.iter().map(|a| a.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2"]);
}

#[tokio::test]
async fn test_scan_respects_sample_cap() {
    let state = test_state(&FakeCatalog::new()).await;
    seed_catalog(&state.db).await;

    let config = DuplicateConfig {
        name_sample_cap: 3,
        ..DuplicateConfig::default()
    };
    let report = DuplicateDetector::new(state.db.clone(), config)
        .scan()
        .await
        .unwrap();

    // Identifier matching still covers every artist
    assert_eq!(report.scanned, 7);
    assert_eq!(report.high_count, 1);
    assert_eq!(report.name_sample_size, 3);
    assert!(report.truncated);
}

#[tokio::test]
async fn test_scan_of_empty_catalog() {
    let state = test_state(&FakeCatalog::new()).await;

    let report = DuplicateDetector::new(state.db.clone(), DuplicateConfig::default())
        .scan()
        .await
        .unwrap();

    assert!(report.groups.is_empty());
    assert_eq!(report.scanned, 0);
}
