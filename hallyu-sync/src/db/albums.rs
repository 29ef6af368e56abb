//! Album database operations
//!
//! Only albums carrying a MusicBrainz id are managed by the discography sync;
//! manually curated albums without one are never read or removed here.

use crate::services::sources::{AlbumType, ReleaseEntry};
use hallyu_common::db::Album;
use hallyu_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Albums of an artist that have a MusicBrainz id, as release entries
pub async fn load_tracked_albums(
    conn: &mut SqliteConnection,
    artist_id: &str,
) -> Result<Vec<ReleaseEntry>> {
    let rows = sqlx::query_as::<_, Album>(
        r#"
        SELECT id, artist_id, title, album_type, release_date, mbid, cover_url
        FROM albums
        WHERE artist_id = ? AND mbid IS NOT NULL
        ORDER BY release_date, title
        "#,
    )
    .bind(artist_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|album| {
            let album_type = album.album_type.parse::<AlbumType>().ok()?;
            Some(ReleaseEntry {
                mbid: album.mbid?,
                title: album.title,
                album_type,
                release_date: album.release_date,
                cover_url: album.cover_url,
            })
        })
        .collect())
}

/// Insert a release for an artist
///
/// Returns false when the MusicBrainz id is already stored (for example on a
/// group's or another member's album row).
pub async fn insert_release(
    conn: &mut SqliteConnection,
    artist_id: &str,
    release: &ReleaseEntry,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO albums (id, artist_id, title, album_type, release_date, mbid, cover_url)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(mbid) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(artist_id)
    .bind(&release.title)
    .bind(release.album_type.as_str())
    .bind(&release.release_date)
    .bind(&release.mbid)
    .bind(&release.cover_url)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_release(
    conn: &mut SqliteConnection,
    artist_id: &str,
    release: &ReleaseEntry,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE albums SET release_date = ?, cover_url = ?, updated_at = CURRENT_TIMESTAMP
        WHERE artist_id = ? AND mbid = ?
        "#,
    )
    .bind(&release.release_date)
    .bind(&release.cover_url)
    .bind(artist_id)
    .bind(&release.mbid)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn delete_release(conn: &mut SqliteConnection, artist_id: &str, mbid: &str) -> Result<()> {
    sqlx::query("DELETE FROM albums WHERE artist_id = ? AND mbid = ?")
        .bind(artist_id)
        .bind(mbid)
        .execute(conn)
        .await?;
    Ok(())
}

/// Insert an album row as is
pub async fn insert_album(conn: &mut SqliteConnection, album: &Album) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO albums (id, artist_id, title, album_type, release_date, mbid, cover_url)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&album.id)
    .bind(&album.artist_id)
    .bind(&album.title)
    .bind(&album.album_type)
    .bind(&album.release_date)
    .bind(&album.mbid)
    .bind(&album.cover_url)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn count_albums(conn: &mut SqliteConnection, artist_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM albums WHERE artist_id = ?")
        .bind(artist_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}
