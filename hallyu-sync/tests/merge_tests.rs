//! Artist Merge Integration Tests
//!
//! Merges two seeded artists with rows in every relation table and checks
//! what the kept artist ends up with.

mod helpers;

use hallyu_common::db::Artist;
use hallyu_common::events::HallyuEvent;
use hallyu_common::Error;
use hallyu_sync::db::artists::load_artist;
use hallyu_sync::services::ArtistMerger;
use hallyu_sync::AppState;
use helpers::*;
use sqlx::SqlitePool;

/// `k1` (kept) and `d1` (duplicate) sharing one favorite, with a credit,
/// a group membership, a news link and an album on the duplicate only
async fn seed_duplicates(pool: &SqlitePool) {
    let mut keep = Artist::new("k1", "Jisoo");
    keep.name_hangul = Some("지수".to_string());
    keep.view_count = 10;
    keep.favorite_count = 2;
    keep.stage_names = Some(r#"["Jisoo"]"#.to_string());
    keep.social_links = Some(r#"{"instagram":"https://instagram.com/sooyaaa__"}"#.to_string());
    seed_artist(pool, &keep).await;

    let mut duplicate = Artist::new("d1", "Kim Jisoo");
    duplicate.tmdb_id = Some(100);
    duplicate.bio = Some("Member of BLACKPINK".to_string());
    duplicate.view_count = 5;
    duplicate.favorite_count = 1;
    duplicate.stage_names = Some(r#"["jisoo","Chu"]"#.to_string());
    duplicate.social_links = Some(
        r#"{"instagram":"https://instagram.com/other","twitter":"https://twitter.com/jisoo"}"#
            .to_string(),
    );
    seed_artist(pool, &duplicate).await;

    for sql in [
        "INSERT INTO users (id, email) VALUES ('u1', 'blink1@example.com'), ('u2', 'blink2@example.com')",
        "INSERT INTO user_favorites (user_id, artist_id) VALUES ('u1', 'k1'), ('u1', 'd1'), ('u2', 'd1')",
        "INSERT INTO news (id, title) VALUES ('n1', 'Snowdrop wraps filming')",
        "INSERT INTO news_artists (news_id, artist_id) VALUES ('n1', 'd1')",
        "INSERT INTO music_groups (id, name) VALUES ('g1', 'BLACKPINK')",
        "INSERT INTO group_members (group_id, artist_id, role) VALUES ('g1', 'd1', 'vocalist')",
        "INSERT INTO productions (id, title, media_type, tmdb_id) VALUES ('p1', 'Snowdrop', 'tv', 10)",
        "INSERT INTO artist_productions (artist_id, production_id, role, character_name) \
         VALUES ('d1', 'p1', 'actor', 'Eun Young-ro')",
        "INSERT INTO albums (id, artist_id, title, album_type, mbid) VALUES ('al1', 'd1', 'ME', 'SINGLE', 'rg-me')",
    ] {
        execute(pool, sql).await;
    }
}

async fn merge_state() -> AppState {
    let state = test_state(&FakeCatalog::new()).await;
    seed_duplicates(&state.db).await;
    state
}

#[tokio::test]
async fn test_merge_moves_relations_and_deletes_duplicate() {
    let state = merge_state().await;
    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());

    let report = merger.merge("k1", "d1").await.unwrap();

    assert_eq!(report.keep_id, "k1");
    assert_eq!(report.deleted_id, "d1");
    assert_eq!(report.albums_moved, 1);

    let favorites = report
        .relations
        .iter()
        .find(|r| r.relation == "user_favorites")
        .unwrap();
    assert_eq!(favorites.moved, 1);
    assert_eq!(favorites.dropped, 1);

    for relation in ["artist_productions", "group_members", "news_artists"] {
        let moved = report.relations.iter().find(|r| r.relation == relation).unwrap();
        assert_eq!(moved.moved, 1, "{}", relation);
        assert_eq!(moved.dropped, 0, "{}", relation);
    }

    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM artists WHERE id = 'd1'").await, 0);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM user_favorites WHERE artist_id = 'k1'").await, 2);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM albums WHERE artist_id = 'k1'").await, 1);
    for table in ["user_favorites", "artist_productions", "group_members", "news_artists", "albums"] {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE artist_id = 'd1'", table);
        assert_eq!(count(&state.db, &sql).await, 0, "{} still references d1", table);
    }

    let character: Option<String> = sqlx::query_scalar(
        "SELECT character_name FROM artist_productions WHERE artist_id = 'k1' AND production_id = 'p1'",
    )
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(character.as_deref(), Some("Eun Young-ro"));
}

#[tokio::test]
async fn test_merge_combines_profile_fields() {
    let state = merge_state().await;
    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());

    let report = merger.merge("k1", "d1").await.unwrap();
    assert!(report.backfilled_fields.contains(&"tmdb_id".to_string()));
    assert!(report.backfilled_fields.contains(&"bio".to_string()));
    assert!(!report.backfilled_fields.contains(&"name_hangul".to_string()));

    let mut conn = state.db.acquire().await.unwrap();
    let kept = load_artist(&mut conn, "k1").await.unwrap().unwrap();

    assert_eq!(kept.name_romanized, "Jisoo");
    assert_eq!(kept.name_hangul.as_deref(), Some("지수"));
    // Unique external id moved over from the deleted row
    assert_eq!(kept.tmdb_id, Some(100));
    assert_eq!(kept.bio.as_deref(), Some("Member of BLACKPINK"));
    assert_eq!(kept.view_count, 15);
    assert_eq!(kept.favorite_count, 3);
    assert_eq!(kept.stage_names(), vec!["Jisoo".to_string(), "Chu".to_string()]);

    let links = kept.social_links();
    assert_eq!(links.len(), 2);
    assert_eq!(links["instagram"], "https://instagram.com/sooyaaa__");
    assert_eq!(links["twitter"], "https://twitter.com/jisoo");
}

#[tokio::test]
async fn test_merge_emits_event() {
    let state = merge_state().await;
    let mut rx = state.event_bus.subscribe();
    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());

    merger.merge("k1", "d1").await.unwrap();

    match rx.try_recv().unwrap() {
        HallyuEvent::ArtistsMerged {
            keep_id,
            deleted_id,
            ..
        } => {
            assert_eq!(keep_id, "k1");
            assert_eq!(deleted_id, "d1");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_merge_with_missing_artist_changes_nothing() {
    let state = merge_state().await;
    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());

    let err = merger.merge("k1", "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM artists").await, 2);
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM user_favorites WHERE artist_id = 'd1'").await, 2);
}

#[tokio::test]
async fn test_merge_into_itself_is_rejected() {
    let state = merge_state().await;
    let merger = ArtistMerger::new(state.db.clone(), state.event_bus.clone());

    let err = merger.merge("k1", "k1").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(count(&state.db, "SELECT COUNT(*) FROM artists").await, 2);
}
