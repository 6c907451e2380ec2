//! Lookup from a download id to its live `DownloadHandle`, so the streaming
//! handler can bias swarm piece scheduling toward the bytes a viewer is
//! currently requesting. Populated by the worker, consulted by the streaming
//! handler, and otherwise empty for finished (on-disk only) downloads.

use std::collections::HashMap;

use tokio::sync::Mutex;
use torrent::DownloadHandle;

#[derive(Debug, Clone)]
pub struct LiveDownload {
    pub handle: DownloadHandle,
    pub piece_length: u32,
}

#[derive(Default)]
pub struct LiveRegistry {
    entries: Mutex<HashMap<String, LiveDownload>>,
}

impl LiveRegistry {
    pub async fn insert(&self, id: String, entry: LiveDownload) {
        self.entries.lock().await.insert(id, entry);
    }

    pub async fn remove(&self, id: &str) {
        self.entries.lock().await.remove(id);
    }

    pub async fn get(&self, id: &str) -> Option<LiveDownload> {
        self.entries.lock().await.get(id).cloned()
    }
}
