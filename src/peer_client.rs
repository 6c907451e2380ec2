//! Thin wrapper around the in-repo `torrent` crate, translating its real
//! download-state/progress surface into the `noPeers`/`download`/`done`/
//! `error` event contract the worker drives off of.
//!
//! Grounded on the teacher's `src/torrent.rs` (`TorrentClient`/`TorrentHandle`
//! naming, `watch` progress plumbing), ported from the stale
//! `client.download(...)` call it used onto the current `torrent::Client`
//! surface (`Client::open(DownloadParams, ProgressConsumer)`).

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use tokio::sync::{broadcast, mpsc, Mutex};
use torrent::{DownloadHandle, DownloadParams, DownloadProgress, DownloadState, MagnetLink, Priority};

/// Extensions picked as "playable" by both the facade's file selection and
/// the streaming handler's media-file picker.
pub const PLAYABLE_EXTENSIONS: &[&str] = &["mp4", "ogg", "mov", "webmv", "mkv", "wmv", "avi"];

pub fn is_playable(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_lowercase();
    PLAYABLE_EXTENSIONS.iter().any(|allowed| ext.contains(allowed))
}

/// Ticks with zero connected peers while still pending, before the facade
/// gives up and reports `noPeers(dht)`. At the default 500ms tick this is 30s.
const NO_PEERS_GRACE_TICKS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPeersSource {
    Dht,
    Tracker,
}

#[derive(Debug, Clone)]
pub enum PeerEvent {
    NoPeers(NoPeersSource),
    Download {
        percent: f32,
        speed: u64,
        num_peers: usize,
    },
    Done,
    Error(String),
}

/// A live torrent handed back to the worker. Dropping the receiver half of
/// `events` does not stop the underlying download; call [`PeerClient::remove`].
pub struct TorrentHandle {
    pub chosen_file: PathBuf,
    pub events: mpsc::Receiver<PeerEvent>,
    pub piece_length: u32,
    pub inner: DownloadHandle,
}

impl TorrentHandle {
    pub fn abort(&self) {
        self.inner.abort();
    }
}

struct ActiveDownload {
    magnet_uri: String,
    handle: DownloadHandle,
}

/// Fatal, process-wide failure of the underlying peer-to-peer client. The
/// queue tears down and rebuilds its `PeerClient` in response and re-drives
/// every pending download from scratch.
#[derive(Debug, Clone)]
pub struct PeerClientFatalError(pub String);

pub struct PeerClient {
    client: torrent::Client,
    active: Mutex<Vec<ActiveDownload>>,
    fatal_errors: broadcast::Sender<PeerClientFatalError>,
}

impl PeerClient {
    pub async fn new(config: torrent::ClientConfig) -> anyhow::Result<Self> {
        let client = torrent::Client::new(config).await?;
        let (fatal_errors, _) = broadcast::channel(16);
        Ok(Self {
            client,
            active: Mutex::new(Vec::new()),
            fatal_errors,
        })
    }

    pub fn subscribe_fatal_errors(&self) -> broadcast::Receiver<PeerClientFatalError> {
        self.fatal_errors.subscribe()
    }

    /// Resolves the magnet, selects exactly one playable file (largest byte
    /// length among matches; first file with a warning if none match), and
    /// opens the download. Returns once metadata is received and the swarm
    /// join has been dispatched; progress then streams on `events`.
    pub async fn add(&self, magnet_uri: &str, target_dir: &Path) -> anyhow::Result<TorrentHandle> {
        let magnet = MagnetLink::from_str(magnet_uri)?;
        let trackers = magnet.all_trackers().unwrap_or_default();
        let info = match self.client.resolve_magnet_link(&magnet).await {
            Ok(info) => info,
            Err(e) => {
                let _ = self
                    .fatal_errors
                    .send(PeerClientFatalError(format!("failed to resolve magnet: {e}")));
                return Err(e);
            }
        };

        let piece_length = info.piece_length;
        let output_files = info.output_files(target_dir);
        let chosen_idx = select_file_index(&output_files);
        let chosen_file = output_files[chosen_idx].path().to_path_buf();

        let files: Vec<Priority> = (0..output_files.len())
            .map(|i| {
                if i == chosen_idx {
                    Priority::High
                } else {
                    Priority::Disabled
                }
            })
            .collect();

        let params = DownloadParams::empty(info, trackers, files, target_dir.to_path_buf());

        let (progress_tx, progress_rx) = mpsc::channel::<DownloadProgress>(64);
        let inner = self.client.open(params, progress_tx).await?;

        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(translate_progress(progress_rx, events_tx));

        self.active.lock().await.push(ActiveDownload {
            magnet_uri: magnet_uri.to_string(),
            handle: inner.clone(),
        });

        Ok(TorrentHandle {
            chosen_file,
            events: events_rx,
            piece_length,
            inner,
        })
    }

    /// Detaches from the swarm. Safe to call after `done` or `noPeers`, and
    /// safe to call on an already-removed magnet.
    pub async fn remove(&self, magnet_uri: &str) {
        let mut active = self.active.lock().await;
        if let Some(pos) = active.iter().position(|d| d.magnet_uri == magnet_uri) {
            let removed = active.swap_remove(pos);
            removed.handle.abort();
        }
    }
}

fn select_file_index(files: &[torrent::OutputFile]) -> usize {
    let best = files
        .iter()
        .enumerate()
        .filter(|(_, f)| is_playable(f.path()))
        .max_by_key(|(_, f)| f.length());
    match best {
        Some((idx, _)) => idx,
        None => {
            tracing::warn!("No playable file found in torrent, defaulting to first file");
            0
        }
    }
}

async fn translate_progress(
    mut progress_rx: mpsc::Receiver<DownloadProgress>,
    events_tx: mpsc::Sender<PeerEvent>,
) {
    let mut no_peers_ticks = 0usize;
    let mut reported_done = false;

    while let Some(progress) = progress_rx.recv().await {
        if reported_done {
            continue;
        }

        for change in &progress.changes {
            if let torrent::StateChange::DownloadStateChange(DownloadState::Error(e)) = change {
                let _ = events_tx.send(PeerEvent::Error(e.to_string())).await;
            }
        }

        if progress.percent >= 100.0 {
            reported_done = true;
            let _ = events_tx.send(PeerEvent::Done).await;
            continue;
        }

        if progress.peers.is_empty() {
            no_peers_ticks += 1;
            if no_peers_ticks == NO_PEERS_GRACE_TICKS {
                let _ = events_tx.send(PeerEvent::NoPeers(NoPeersSource::Dht)).await;
            }
        } else {
            no_peers_ticks = 0;
        }

        let _ = events_tx
            .send(PeerEvent::Download {
                percent: progress.percent,
                speed: progress.download_speed(),
                num_peers: progress.peers.len(),
            })
            .await;
    }
}

/// Estimates remaining download time from current percent and speed. Returns
/// `None` when speed is zero (cannot extrapolate).
pub fn estimate_time_remaining(total_size: u64, percent: f32, speed: u64) -> Option<Duration> {
    if speed == 0 {
        return None;
    }
    let remaining_bytes = (total_size as f64 * (1.0 - percent as f64 / 100.0)).max(0.0);
    Some(Duration::from_secs_f64(remaining_bytes / speed as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_playable_matches_known_extensions() {
        assert!(is_playable(Path::new("/downloads/movie.mp4")));
        assert!(is_playable(Path::new("/downloads/Movie.MKV")));
        assert!(!is_playable(Path::new("/downloads/movie.nfo")));
        assert!(!is_playable(Path::new("/downloads/sample")));
    }

    #[test]
    fn estimate_time_remaining_zero_speed_is_none() {
        assert_eq!(estimate_time_remaining(1000, 50.0, 0), None);
    }

    #[test]
    fn estimate_time_remaining_extrapolates_from_percent_and_speed() {
        let remaining = estimate_time_remaining(1000, 50.0, 100).unwrap();
        assert_eq!(remaining, Duration::from_secs_f64(5.0));
    }

    #[test]
    fn estimate_time_remaining_at_completion_is_zero() {
        let remaining = estimate_time_remaining(1000, 100.0, 100).unwrap();
        assert_eq!(remaining, Duration::from_secs(0));
    }

    #[test]
    fn select_file_index_picks_largest_playable_file() {
        let files = vec![
            torrent::OutputFile::new(100, PathBuf::from("sample.mp4")),
            torrent::OutputFile::new(5_000_000, PathBuf::from("movie.mkv")),
            torrent::OutputFile::new(9_999_999, PathBuf::from("readme.txt")),
        ];
        assert_eq!(select_file_index(&files), 1);
    }

    #[test]
    fn select_file_index_falls_back_to_first_file_when_nothing_playable() {
        let files = vec![
            torrent::OutputFile::new(10, PathBuf::from("readme.txt")),
            torrent::OutputFile::new(20, PathBuf::from("sample.nfo")),
        ];
        assert_eq!(select_file_index(&files), 0);
    }
}
