//! Codec probing and on-the-fly transcoding via the system `ffprobe`/`ffmpeg`
//! binaries.
//!
//! Grounded on the teacher's `src/ffmpeg.rs`: `get_metadata`'s exact ffprobe
//! invocation (`-print_format json=compact=1 -show_streams -show_format`)
//! and the piped-stdout `Command` spawn pattern used throughout that file,
//! trimmed to the two operations the streaming handler needs.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeStream {
    pub codec_type: String,
    pub codec_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeOutput {
    pub streams: Vec<ProbeStream>,
}

impl ProbeOutput {
    pub fn video_codec(&self) -> Option<&str> {
        self.streams
            .iter()
            .find(|s| s.codec_type == "video")
            .and_then(|s| s.codec_name.as_deref())
    }
}

/// Probes `path` with ffprobe. Intentionally does not surface chapters or
/// format metadata — the streaming handler only needs the video codec name.
pub async fn probe(path: &Path) -> anyhow::Result<ProbeOutput> {
    let output = Command::new("ffprobe")
        .args([
            "-v".as_ref(),
            "quiet".as_ref(),
            "-print_format".as_ref(),
            "json=compact=1".as_ref(),
            "-show_streams".as_ref(),
            path.as_os_str(),
        ])
        .output()
        .await?;
    anyhow::ensure!(output.status.success(), "ffprobe exited with {}", output.status);
    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Spawns ffmpeg transcoding `path` into a faststart matroska stream on
/// stdout. The caller owns the child process and reads its stdout directly;
/// dropping the returned child kills it (`kill_on_drop`).
pub fn spawn_transcode(path: &Path) -> std::io::Result<tokio::process::Child> {
    Command::new("ffmpeg")
        .args([
            "-hide_banner".as_ref(),
            "-loglevel".as_ref(),
            "error".as_ref(),
            "-i".as_ref(),
            path.as_os_str(),
            "-c:v".as_ref(),
            "libx264".as_ref(),
            "-c:a".as_ref(),
            "aac".as_ref(),
            "-f".as_ref(),
            "matroska".as_ref(),
            "-movflags".as_ref(),
            "faststart".as_ref(),
            "-".as_ref(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_codec_finds_the_video_stream() {
        let output: ProbeOutput = serde_json::from_str(
            r#"{"streams":[{"codec_type":"audio","codec_name":"aac"},{"codec_type":"video","codec_name":"hevc"}]}"#,
        )
        .unwrap();
        assert_eq!(output.video_codec(), Some("hevc"));
    }

    #[test]
    fn video_codec_none_when_no_video_stream() {
        let output: ProbeOutput =
            serde_json::from_str(r#"{"streams":[{"codec_type":"audio","codec_name":"aac"}]}"#).unwrap();
        assert_eq!(output.video_codec(), None);
    }
}
