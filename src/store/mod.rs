//! Typed CRUD over the three record kinds the engine persists, plus a
//! merge-update operation that serializes writes to the same record.
//!
//! Grounded on the teacher's `src/db.rs` connection/pool pattern, but built
//! against sqlx's runtime query API (`sqlx::query`/`query_as`) rather than
//! the compile-time `query!` macros, which require a live database or an
//! offline query cache at build time.

mod model;

use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::{sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool};

pub use model::{
    Download, DownloadStatus, DownloadSubDocPatch, DownloadType, Episode, Item, ItemType, Movie,
    TorrentOption,
};

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS downloads (
    id TEXT PRIMARY KEY,
    item_type TEXT NOT NULL,
    quality TEXT NOT NULL,
    download_type TEXT NOT NULL,
    status TEXT NOT NULL,
    progress REAL NOT NULL DEFAULT 0,
    speed INTEGER,
    time_remaining INTEGER,
    num_peers INTEGER,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS movies (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    torrents TEXT NOT NULL DEFAULT '[]',
    download_status TEXT,
    downloading INTEGER NOT NULL DEFAULT 0,
    download_complete INTEGER NOT NULL DEFAULT 0,
    downloaded_on INTEGER
);
CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY,
    show_title TEXT NOT NULL,
    title TEXT NOT NULL,
    torrents TEXT NOT NULL DEFAULT '[]',
    download_status TEXT,
    downloading INTEGER NOT NULL DEFAULT 0,
    download_complete INTEGER NOT NULL DEFAULT 0,
    downloaded_on INTEGER
);
"#;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::query::<Sqlite>(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn find_download(&self, id: &str) -> Result<Option<Download>, sqlx::Error> {
        sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Pending downloads are those still occupying a queue/worker slot.
    pub async fn find_pending(&self) -> Result<Vec<Download>, sqlx::Error> {
        sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads WHERE status IN ('queued', 'connecting', 'downloading') ORDER BY updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_item(&self, download: &Download) -> Result<Item, EngineError> {
        match download.item_type {
            ItemType::Movie => {
                let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = ?")
                    .bind(&download.id)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(Item::Movie(movie))
            }
            ItemType::Episode => {
                let episode = sqlx::query_as::<_, Episode>("SELECT * FROM episodes WHERE id = ?")
                    .bind(&download.id)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(Item::Episode(episode))
            }
        }
    }

    pub async fn insert_download(&self, download: &Download) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO downloads
                (id, item_type, quality, download_type, status, progress, speed, time_remaining, num_peers, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&download.id)
        .bind(download.item_type.as_str())
        .bind(&download.quality)
        .bind(download.download_type.as_str())
        .bind(download.status.as_str())
        .bind(download.progress)
        .bind(download.speed)
        .bind(download.time_remaining)
        .bind(download.num_peers)
        .bind(download.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Shallow-merges `patch` into the persisted `Download`, always bumping
    /// `updated_at`. On persistence failure, logs and returns the unsaved
    /// in-memory record rather than propagating: progress writes are
    /// best-effort telemetry, and losing one must not abort the download.
    pub async fn update_download(&self, mut download: Download, patch: DownloadPatch) -> Download {
        if let Some(status) = patch.status {
            download.status = status;
        }
        if let Some(progress) = patch.progress {
            download.progress = progress;
        }
        patch.speed.apply(&mut download.speed);
        patch.time_remaining.apply(&mut download.time_remaining);
        patch.num_peers.apply(&mut download.num_peers);
        download.updated_at = now_ms();

        let result = sqlx::query(
            "UPDATE downloads SET status = ?, progress = ?, speed = ?, time_remaining = ?, num_peers = ?, updated_at = ? WHERE id = ?",
        )
        .bind(download.status.as_str())
        .bind(download.progress)
        .bind(download.speed)
        .bind(download.time_remaining)
        .bind(download.num_peers)
        .bind(download.updated_at)
        .bind(&download.id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(download_id = %download.id, "Failed to persist download update: {e}");
        }
        download
    }

    /// Merges a patch into the parent item's embedded `download` sub-document.
    pub async fn update_item_download(&self, item_type: ItemType, id: &str, patch: DownloadSubDocPatch) {
        let table = match item_type {
            ItemType::Movie => "movies",
            ItemType::Episode => "episodes",
        };
        let mut set_clauses = Vec::new();
        if patch.download_status.is_some() {
            set_clauses.push("download_status = ?");
        }
        if patch.downloading.is_some() {
            set_clauses.push("downloading = ?");
        }
        if patch.download_complete.is_some() {
            set_clauses.push("download_complete = ?");
        }
        if patch.downloaded_on.is_some() {
            set_clauses.push("downloaded_on = ?");
        }
        if set_clauses.is_empty() {
            return;
        }
        let query = format!("UPDATE {table} SET {} WHERE id = ?", set_clauses.join(", "));
        let mut q = sqlx::query(&query);
        if let Some(status) = &patch.download_status {
            q = q.bind(status.as_str());
        }
        if let Some(downloading) = patch.downloading {
            q = q.bind(downloading);
        }
        if let Some(complete) = patch.download_complete {
            q = q.bind(complete);
        }
        if let Some(downloaded_on) = patch.downloaded_on {
            q = q.bind(downloaded_on);
        }
        let result = q.bind(id).execute(&self.pool).await;
        if let Err(e) = result {
            tracing::error!(item_id = %id, "Failed to persist item download status: {e}");
        }
    }

    pub async fn delete_download(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Looks up the magnet for `quality` among the parent item's `torrents[]`.
    pub async fn find_torrent_option(
        &self,
        item_type: ItemType,
        id: &str,
        quality: &str,
    ) -> Result<Option<TorrentOption>, EngineError> {
        let table = match item_type {
            ItemType::Movie => "movies",
            ItemType::Episode => "episodes",
        };
        let row = sqlx::query(&format!("SELECT torrents FROM {table} WHERE id = ?"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let raw: String = row.try_get("torrents")?;
        let options: Vec<TorrentOption> = serde_json::from_str(&raw).unwrap_or_default();
        Ok(options.into_iter().find(|o| o.quality == quality))
    }
}

/// Optional field: distinguishes "leave untouched" from "set to null".
#[derive(Debug, Clone, Copy, Default)]
pub enum Patchable<T> {
    #[default]
    Untouched,
    Set(Option<T>),
}

impl<T: Copy> Patchable<T> {
    fn apply(self, target: &mut Option<T>) {
        if let Patchable::Set(value) = self {
            *target = value;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadPatch {
    pub status: Option<DownloadStatus>,
    pub progress: Option<f64>,
    pub speed: Patchable<i64>,
    pub time_remaining: Patchable<i64>,
    pub num_peers: Patchable<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patchable_untouched_leaves_target_alone() {
        let mut target = Some(7i64);
        Patchable::Untouched.apply(&mut target);
        assert_eq!(target, Some(7));
    }

    #[test]
    fn patchable_set_some_overwrites_target() {
        let mut target = Some(7i64);
        Patchable::Set(Some(42)).apply(&mut target);
        assert_eq!(target, Some(42));
    }

    #[test]
    fn patchable_set_none_clears_target() {
        let mut target = Some(7i64);
        Patchable::Set(None).apply(&mut target);
        assert_eq!(target, None);
    }

    #[test]
    fn item_type_as_str_round_trips() {
        assert_eq!(ItemType::Movie.as_str(), "movie");
        assert_eq!(ItemType::Episode.as_str(), "episode");
    }

    #[test]
    fn download_status_as_str_round_trips() {
        assert_eq!(DownloadStatus::Queued.as_str(), "queued");
        assert_eq!(DownloadStatus::Downloading.as_str(), "downloading");
        assert_eq!(DownloadStatus::Complete.as_str(), "complete");
        assert_eq!(DownloadStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn new_download_starts_queued_with_zero_progress() {
        let download = Download::new("abc", ItemType::Movie, "1080p", DownloadType::Download);
        assert_eq!(download.status.as_str(), "queued");
        assert_eq!(download.progress, 0.0);
        assert!(download.speed.is_none());
    }

    #[tokio::test]
    async fn insert_find_update_delete_round_trip() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let download = Download::new("abc", ItemType::Movie, "1080p", DownloadType::Download);
        store.insert_download(&download).await.unwrap();

        let found = store.find_download("abc").await.unwrap().unwrap();
        assert_eq!(found.status.as_str(), "queued");
        assert_eq!(found.progress, 0.0);

        let updated = store
            .update_download(
                found,
                DownloadPatch {
                    status: Some(DownloadStatus::Downloading),
                    progress: Some(42.5),
                    speed: Patchable::Set(Some(1024)),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(updated.status.as_str(), "downloading");
        assert_eq!(updated.progress, 42.5);
        assert_eq!(updated.speed, Some(1024));

        let reloaded = store.find_download("abc").await.unwrap().unwrap();
        assert_eq!(reloaded.progress, 42.5);

        store.delete_download("abc").await.unwrap();
        assert!(store.find_download("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_pending_only_returns_active_statuses() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let active = Download::new("active", ItemType::Movie, "1080p", DownloadType::Download);
        store.insert_download(&active).await.unwrap();

        let mut done = Download::new("done", ItemType::Movie, "720p", DownloadType::Download);
        done.status = DownloadStatus::Complete;
        store.insert_download(&done).await.unwrap();

        let pending = store.find_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "active");
    }

    #[tokio::test]
    async fn update_item_download_is_a_noop_with_an_empty_patch() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO movies (id, title) VALUES (?, ?)")
            .bind("movie-1")
            .bind("Example")
            .execute(&store.pool)
            .await
            .unwrap();

        // Should not error even though no SET clause is generated.
        store
            .update_item_download(ItemType::Movie, "movie-1", DownloadSubDocPatch::default())
            .await;
    }
}
