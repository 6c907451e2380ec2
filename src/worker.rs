//! Per-download state machine: resolve item, pick a magnet, drive the peer
//! client, push progress into the store, finalize or fail.
//!
//! Grounded on the teacher's `src/torrent.rs` progress-consumer loop, adapted
//! to the store/peer-client split used in this engine.

use std::sync::Arc;

use crate::{
    error::EngineError,
    fs_layout,
    live::{LiveDownload, LiveRegistry},
    peer_client::{NoPeersSource, PeerClient, PeerEvent},
    store::{Download, DownloadPatch, DownloadStatus, DownloadSubDocPatch, Item, Patchable, Store},
};

/// Minimum progress delta, in percentage points, before a tick is worth a
/// store write. See the `updatingModel` latch description this mirrors.
const PROGRESS_EPSILON: f64 = 0.5;

pub struct WorkerContext {
    pub store: Arc<Store>,
    pub peer_client: Arc<PeerClient>,
    pub live: Arc<LiveRegistry>,
    pub download_root: std::path::PathBuf,
}

/// Drives `download` from `queued` through to a terminal state
/// (`complete`/`failed`/`removed`). Returns once the slot is free again.
pub async fn run(ctx: Arc<WorkerContext>, mut download: Download) {
    let id = download.id.clone();

    let item = match ctx.store.find_item(&download).await {
        Ok(item) => item,
        Err(e) => {
            tracing::error!(download_id = %id, "Failed to resolve catalog item: {e}");
            fail_resolving(&ctx, download).await;
            return;
        }
    };

    let magnet_url = match find_magnet(&ctx, &download, &item).await {
        Ok(Some(url)) => url,
        Ok(None) => {
            tracing::warn!(download_id = %id, quality = %download.quality, "No magnet for requested quality");
            fail_resolving(&ctx, download).await;
            return;
        }
        Err(e) => {
            tracing::error!(download_id = %id, "Failed to look up torrent option: {e}");
            fail_resolving(&ctx, download).await;
            return;
        }
    };

    download = enter_connecting(&ctx, download).await;

    let target_dir = fs_layout::dir_for(&ctx.download_root, &id);
    let mut handle = match ctx.peer_client.add(&magnet_url, &target_dir).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(download_id = %id, "Failed to add magnet to peer client: {e}");
            fail_connected(&ctx, download, &magnet_url).await;
            return;
        }
    };

    ctx.live
        .insert(
            id.clone(),
            LiveDownload {
                handle: handle.inner.clone(),
                piece_length: handle.piece_length,
            },
        )
        .await;

    let mut updated_parent_once = false;
    let mut last_pushed_progress: f64 = -1.0;
    let mut last_pushed_peers: i64 = -1;

    while let Some(event) = handle.events.recv().await {
        match event {
            PeerEvent::NoPeers(NoPeersSource::Dht) => {
                tracing::warn!(download_id = %id, "No peers found via DHT, failing download");
                handle.abort();
                fail_connected(&ctx, download, &magnet_url).await;
                return;
            }
            PeerEvent::NoPeers(NoPeersSource::Tracker) => {
                tracing::debug!(download_id = %id, "No peers from tracker (informational)");
            }
            PeerEvent::Error(e) => {
                tracing::error!(download_id = %id, "Peer client reported error: {e}");
            }
            PeerEvent::Download {
                percent,
                speed,
                num_peers,
            } => {
                let progress = percent as f64;
                let should_push = !updated_parent_once
                    || (progress - last_pushed_progress).abs() >= PROGRESS_EPSILON
                    || num_peers as i64 != last_pushed_peers;

                if !should_push {
                    continue;
                }

                let time_remaining = crate::peer_client::estimate_time_remaining(
                    total_size_hint(&item),
                    percent,
                    speed,
                )
                .map(|d| d.as_secs() as i64);

                download = ctx
                    .store
                    .update_download(
                        download,
                        DownloadPatch {
                            status: Some(DownloadStatus::Downloading),
                            progress: Some(progress),
                            speed: Patchable::Set(Some(speed as i64)),
                            time_remaining: Patchable::Set(time_remaining),
                            num_peers: Patchable::Set(Some(num_peers as i64)),
                        },
                    )
                    .await;

                if !updated_parent_once {
                    ctx.store
                        .update_item_download(
                            download.item_type,
                            &id,
                            DownloadSubDocPatch {
                                download_status: Some(DownloadStatus::Downloading),
                                downloading: Some(true),
                                ..Default::default()
                            },
                        )
                        .await;
                    updated_parent_once = true;
                }

                last_pushed_progress = progress;
                last_pushed_peers = num_peers as i64;
            }
            PeerEvent::Done => {
                finish(&ctx, download, &magnet_url).await;
                return;
            }
        }
    }

    // Peer client dropped the event channel without a terminal event — treat
    // as a crash of the underlying download and requeue.
    tracing::warn!(download_id = %id, "Peer client event stream closed unexpectedly, requeuing");
    ctx.live.remove(&id).await;
    ctx.peer_client.remove(&magnet_url).await;
    let _ = ctx
        .store
        .update_download(
            download,
            DownloadPatch {
                status: Some(DownloadStatus::Queued),
                ..Default::default()
            },
        )
        .await;
}

async fn find_magnet(
    ctx: &WorkerContext,
    download: &Download,
    item: &Item,
) -> Result<Option<String>, EngineError> {
    let id = match item {
        Item::Movie(m) => &m.id,
        Item::Episode(e) => &e.id,
    };
    let option = ctx
        .store
        .find_torrent_option(download.item_type, id, &download.quality)
        .await?;
    Ok(option.map(|o| o.url))
}

fn total_size_hint(_item: &Item) -> u64 {
    // The catalog item does not carry a byte-size estimate for a specific
    // quality's torrent; without it `estimate_time_remaining` falls back to
    // a best-effort guess derived purely from current percent/speed.
    0
}

async fn enter_connecting(ctx: &WorkerContext, download: Download) -> Download {
    let download = ctx
        .store
        .update_download(
            download,
            DownloadPatch {
                status: Some(DownloadStatus::Connecting),
                speed: Patchable::Set(None),
                time_remaining: Patchable::Set(None),
                num_peers: Patchable::Set(None),
                ..Default::default()
            },
        )
        .await;
    ctx.store
        .update_item_download(
            download.item_type,
            &download.id,
            DownloadSubDocPatch {
                download_status: Some(DownloadStatus::Connecting),
                downloading: Some(true),
                ..Default::default()
            },
        )
        .await;
    download
}

/// Failure before a peer-client handle ever existed: no magnet for the
/// requested quality, or the catalog item could not be resolved. Matches the
/// `[resolving] --no-magnet-for-quality--> [failed]` transition, which the
/// spec does not pair with `cleanUpDownload`.
async fn fail_resolving(ctx: &WorkerContext, download: Download) {
    let id = download.id.clone();
    let item_type = download.item_type;
    ctx.store
        .update_download(
            download,
            DownloadPatch {
                status: Some(DownloadStatus::Failed),
                ..Default::default()
            },
        )
        .await;
    ctx.store
        .update_item_download(
            item_type,
            &id,
            DownloadSubDocPatch {
                download_status: Some(DownloadStatus::Failed),
                downloading: Some(false),
                ..Default::default()
            },
        )
        .await;
}

/// Failure after a peer-client handle was opened: `noPeers(dht)` while
/// `connecting`/`downloading`, or a hard error from `peerClient.add`. Tears
/// down the handle and fully cleans up the download's footprint.
async fn fail_connected(ctx: &WorkerContext, download: Download, magnet_url: &str) {
    let id = download.id.clone();
    let item_type = download.item_type;

    ctx.live.remove(&id).await;
    ctx.peer_client.remove(magnet_url).await;

    ctx.store
        .update_download(
            download,
            DownloadPatch {
                status: Some(DownloadStatus::Failed),
                ..Default::default()
            },
        )
        .await;
    ctx.store
        .update_item_download(
            item_type,
            &id,
            DownloadSubDocPatch {
                download_status: Some(DownloadStatus::Failed),
                downloading: Some(false),
                ..Default::default()
            },
        )
        .await;

    cleanup(ctx, &id).await;
}

async fn finish(ctx: &WorkerContext, download: Download, magnet_url: &str) {
    let id = download.id.clone();
    let item_type = download.item_type;

    ctx.store
        .update_download(
            download,
            DownloadPatch {
                status: Some(DownloadStatus::Complete),
                progress: Some(100.0),
                speed: Patchable::Set(None),
                time_remaining: Patchable::Set(None),
                num_peers: Patchable::Set(None),
            },
        )
        .await;
    ctx.store
        .update_item_download(
            item_type,
            &id,
            DownloadSubDocPatch {
                download_status: Some(DownloadStatus::Complete),
                downloading: Some(false),
                download_complete: Some(true),
                downloaded_on: Some(crate::store::now_ms()),
            },
        )
        .await;

    ctx.live.remove(&id).await;
    // media files remain on disk for streaming; no directory cleanup here
    ctx.peer_client.remove(magnet_url).await;
}

/// `cleanUpDownload`: delete the store record, remove the on-disk directory.
/// Safe to call on an unknown id.
pub async fn cleanup(ctx: &WorkerContext, id: &str) {
    if let Err(e) = ctx.store.delete_download(id).await {
        tracing::warn!(download_id = %id, "Failed to delete download record: {e}");
    }
    fs_layout::remove_dir(&fs_layout::dir_for(&ctx.download_root, id)).await;
}
