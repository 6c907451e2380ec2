//! Ordered set of pending downloads, drained by a bounded-concurrency worker
//! pool.
//!
//! Grounded on the teacher's `src/torrent.rs` registry of active downloads,
//! restructured around a FIFO queue and a fixed-size semaphore to match the
//! `maxConcurrent` worker pool this engine requires.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::{
    store::{Download, DownloadPatch, DownloadStatus, DownloadSubDocPatch},
    worker::{self, WorkerContext},
};

pub struct Queue {
    ctx: Arc<WorkerContext>,
    pending: Mutex<Vec<Download>>,
    max_concurrent: usize,
    running: Mutex<bool>,
}

impl Queue {
    pub fn new(ctx: Arc<WorkerContext>, max_concurrent: usize) -> Self {
        Self {
            ctx,
            pending: Mutex::new(Vec::new()),
            max_concurrent: max_concurrent.max(1),
            running: Mutex::new(false),
        }
    }

    /// Appends to the pending list. Callers must not double-enqueue the same
    /// download; the queue performs no deduplication.
    pub async fn add_download(&self, download: Download) {
        self.pending.lock().await.push(download);
    }

    /// Destroys the live handle for `download_id` if one exists, removes it
    /// from the pending list, and marks the record `removed`. Idempotent:
    /// a no-op if the id is unknown. Does not delete the store record or the
    /// on-disk directory; that is `worker::cleanup`'s job, reserved for the
    /// `fail_connected` path.
    pub async fn stop_downloading(&self, download_id: &str) {
        let mut pending = self.pending.lock().await;
        if let Some(pos) = pending.iter().position(|d| d.id == download_id) {
            pending.remove(pos);
        }
        drop(pending);

        self.ctx.live.remove(download_id).await;

        if let Ok(Some(download)) = self.ctx.store.find_download(download_id).await {
            if let Ok(item) = self.ctx.store.find_item(&download).await {
                let id = match &item {
                    crate::store::Item::Movie(m) => &m.id,
                    crate::store::Item::Episode(e) => &e.id,
                };
                if let Ok(Some(option)) = self
                    .ctx
                    .store
                    .find_torrent_option(download.item_type, id, &download.quality)
                    .await
                {
                    self.ctx.peer_client.remove(&option.url).await;
                }
                self.ctx
                    .store
                    .update_item_download(
                        download.item_type,
                        id,
                        DownloadSubDocPatch {
                            download_status: Some(DownloadStatus::Removed),
                            downloading: Some(false),
                            ..Default::default()
                        },
                    )
                    .await;
            }
            self.ctx
                .store
                .update_download(
                    download,
                    DownloadPatch {
                        status: Some(DownloadStatus::Removed),
                        ..Default::default()
                    },
                )
                .await;
        }
    }

    /// Drains a snapshot of the current pending list with bounded
    /// concurrency. Downloads added after the snapshot was taken are not
    /// picked up by this batch; a later call drains them. No-op if already
    /// running or empty.
    pub async fn start_downloads(self: &Arc<Self>) {
        {
            let mut running = self.running.lock().await;
            if *running {
                return;
            }
            let snapshot_empty = self.pending.lock().await.is_empty();
            if snapshot_empty {
                return;
            }
            *running = true;
        }

        let snapshot = std::mem::take(&mut *self.pending.lock().await);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(snapshot.len());

        for download in snapshot {
            let semaphore = Arc::clone(&semaphore);
            let ctx = Arc::clone(&self.ctx);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                worker::run(ctx, download).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        *self.running.lock().await = false;
    }

    /// On process start: load every record still `queued`/`connecting`/
    /// `downloading` and drive them again from scratch. Partial bytes on
    /// disk may be reused by the peer client's own resume logic.
    pub async fn rehydrate_on_start(self: &Arc<Self>) -> Result<(), sqlx::Error> {
        let pending = self.ctx.store.find_pending().await?;
        let count = pending.len();
        {
            let mut slot = self.pending.lock().await;
            slot.extend(pending);
        }
        tracing::info!(count, "Rehydrated pending downloads on start");
        self.start_downloads().await;
        Ok(())
    }
}
