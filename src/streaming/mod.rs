//! `GET /watch/:id` — locates the media file, honors byte ranges, and
//! decides whether to transcode based on a codec probe and client hint.
//!
//! Grounded on the teacher's `src/stream/torrent_stream.rs` (manual
//! `HeaderMap` construction, `Body::from_stream`) and
//! `src/stream/transcode_stream.rs` (probe-then-pipe gate), re-targeted at
//! this engine's filesystem layout and live-download registry instead of the
//! teacher's in-memory torrent/video-content model.

use std::path::Path;

use axum::{
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::{headers, TypedHeader};
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use torrent::ScheduleStrategy;

use crate::{app_state::AppState, error::EngineError, ffmpeg, fs_layout, peer_client};

const HEVC_BLACKLIST: &[&str] = &["hevc"];

#[derive(Debug, Deserialize, Default)]
pub struct WatchQuery {
    device: Option<String>,
    transcode: Option<String>,
}

impl WatchQuery {
    fn wants_transcode(&self) -> bool {
        self.device.as_deref() == Some("chromecast")
            || self
                .transcode
                .as_deref()
                .map(|v| !v.is_empty() && v != "0" && v != "false")
                .unwrap_or(false)
    }
}

pub async fn watch(
    State(app): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<WatchQuery>,
    range: Option<TypedHeader<headers::Range>>,
) -> Result<Response, EngineError> {
    let dir = fs_layout::dir_for(&app.config.download_location, &id);
    let files = fs_layout::list_files(&dir).await?;
    if files.is_empty() {
        return Err(EngineError::not_found(format!("no files for download {id}")));
    }

    let chosen = files
        .into_iter()
        .filter(|p| peer_client::is_playable(p) && !path_contains(p, "transcoding"))
        .max_by_key(|p| p.as_os_str().len())
        .ok_or_else(|| EngineError::not_found(format!("no playable file for download {id}")))?;

    let media_size = tokio::fs::metadata(&chosen).await?.len();
    let live = app.live.get(&id).await;

    let (start, end) = match &range {
        Some(TypedHeader(range)) => match range.satisfiable_ranges(media_size).next() {
            Some((start_bound, end_bound)) => {
                let start = bound_start(start_bound);
                let end = bound_end(end_bound, media_size - 1);
                (start, end)
            }
            None => (0, media_size - 1),
        },
        None => (0, media_size.saturating_sub(1)),
    };

    if let Some(live) = &live {
        let piece = start / live.piece_length as u64;
        if let Err(e) = live.handle.set_strategy(ScheduleStrategy::Request(piece as usize)).await {
            tracing::warn!(download_id = %id, "Failed to set piece schedule strategy: {e}");
        }
    }

    if query.wants_transcode() {
        if let Ok(probe) = ffmpeg::probe(&chosen).await {
            let needs_transcode = query
                .transcode
                .as_deref()
                .map(|v| !v.is_empty() && v != "0" && v != "false")
                .unwrap_or(false)
                || probe.video_codec().map(|c| HEVC_BLACKLIST.contains(&c)).unwrap_or(false);
            if needs_transcode {
                return transcode_response(&chosen);
            }
        }
        // Probe failed, or the codec is already compatible: fall through to
        // the raw stream below.
    }

    raw_response(&chosen, media_size, range.is_some(), start, end, live.is_some()).await
}

fn path_contains(path: &Path, needle: &str) -> bool {
    path.to_string_lossy().contains(needle)
}

fn bound_start(bound: std::ops::Bound<u64>) -> u64 {
    match bound {
        std::ops::Bound::Included(v) | std::ops::Bound::Excluded(v) => v,
        std::ops::Bound::Unbounded => 0,
    }
}

fn bound_end(bound: std::ops::Bound<u64>, default: u64) -> u64 {
    match bound {
        std::ops::Bound::Included(v) => v,
        std::ops::Bound::Excluded(v) => v.saturating_sub(1),
        std::ops::Bound::Unbounded => default,
    }
}

async fn raw_response(
    path: &Path,
    media_size: u64,
    had_range: bool,
    start: u64,
    end: u64,
    is_live: bool,
) -> Result<Response, EngineError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let chunk_size = end - start + 1;
    let limited = file.take(chunk_size);
    let stream = ReaderStream::new(limited);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if had_range {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(chunk_size));
        // Preserves the source spec's Content-Range denominator (chunkSize,
        // not the total media size); see the streaming-handler note.
        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{end}/{chunk_size}"))
                .map_err(|e| EngineError::internal(e.to_string()))?,
        );
        Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
    } else {
        if !is_live {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(media_size));
        }
        Ok((StatusCode::OK, headers, body).into_response())
    }
}

fn transcode_response(path: &Path) -> Result<Response, EngineError> {
    let path = path.to_path_buf();
    let mut child = ffmpeg::spawn_transcode(&path)
        .map_err(|e| EngineError::internal(format!("failed to spawn ffmpeg: {e}")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::internal("ffmpeg child had no stdout"))?;

    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    let stream = ReaderStream::new(stdout);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("video/x-matroska"),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    Ok((StatusCode::OK, headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;

    #[test]
    fn wants_transcode_from_chromecast_device_hint() {
        let query = WatchQuery {
            device: Some("chromecast".to_string()),
            transcode: None,
        };
        assert!(query.wants_transcode());
    }

    #[test]
    fn wants_transcode_from_explicit_flag() {
        let query = WatchQuery {
            device: None,
            transcode: Some("1".to_string()),
        };
        assert!(query.wants_transcode());
    }

    #[test_log::test]
    fn wants_transcode_false_by_default() {
        assert!(!WatchQuery::default().wants_transcode());
        let explicit_off = WatchQuery {
            device: None,
            transcode: Some("false".to_string()),
        };
        assert!(!explicit_off.wants_transcode());
    }

    #[test]
    fn path_contains_matches_substring() {
        assert!(path_contains(Path::new("/data/id/transcoding/out.mp4"), "transcoding"));
        assert!(!path_contains(Path::new("/data/id/movie.mp4"), "transcoding"));
    }

    #[test]
    fn bound_start_variants() {
        assert_eq!(bound_start(Bound::Included(10)), 10);
        assert_eq!(bound_start(Bound::Excluded(10)), 10);
        assert_eq!(bound_start(Bound::Unbounded), 0);
    }

    #[test]
    fn bound_end_variants() {
        assert_eq!(bound_end(Bound::Included(10), 99), 10);
        assert_eq!(bound_end(Bound::Excluded(10), 99), 9);
        assert_eq!(bound_end(Bound::Unbounded, 99), 99);
    }
}
