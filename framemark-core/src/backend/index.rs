use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use super::labels::stored_event_count;
use crate::error::{Error, Result};
use crate::services::{ScanEvent, ScanStream, VideoIndex};
use crate::types::{is_video_file, VideoCatalogEntry, VideoMetadata};

/// Bytes read by [`VideoIndex::preload_header`] to warm the OS cache.
pub const PRELOAD_HEADER_BYTES: u64 = 5 * 1024 * 1024;

const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Lists a folder (non-recursively) and probes videos with `ffprobe`.
#[derive(Debug, Clone)]
pub struct LocalVideoIndex {
    ffprobe: PathBuf,
    channel_capacity: usize,
}

impl Default for LocalVideoIndex {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl LocalVideoIndex {
    /// Use a specific `ffprobe` binary.
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    fn catalog_entry(&self, path: &Path) -> Option<VideoCatalogEntry> {
        let path_str = path.to_str()?;
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Some(VideoCatalogEntry {
            path: path_str.to_string(),
            event_count: stored_event_count(path),
            duration_sec: self.probe_duration(path_str),
            last_modified,
        })
    }

    /// Container duration in seconds, 0.0 when `ffprobe` fails.
    fn probe_duration(&self, path: &str) -> f64 {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                path,
            ])
            .output();

        match output {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .trim()
                .parse()
                .unwrap_or(0.0),
            Ok(output) => {
                tracing::debug!(path, status = %output.status, "ffprobe duration failed");
                0.0
            }
            Err(e) => {
                tracing::debug!(path, error = %e, "ffprobe not runnable");
                0.0
            }
        }
    }

    /// Walk `root`, sending entries until done or until the receiver is gone.
    fn stream_folder(&self, root: &Path, tx: &mpsc::Sender<ScanEvent>) {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Folder listing failed");
                let _ = tx.blocking_send(ScanEvent::ScanComplete);
                return;
            }
        };

        let mut sent = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_video_file(&path) {
                continue;
            }
            let Some(catalog_entry) = self.catalog_entry(&path) else {
                tracing::debug!(path = %path.display(), "Skipping non UTF-8 path");
                continue;
            };
            if tx
                .blocking_send(ScanEvent::EntryDiscovered(catalog_entry))
                .is_err()
            {
                tracing::debug!(root = %root.display(), sent, "Scan abandoned by receiver");
                return;
            }
            sent += 1;
        }

        let _ = tx.blocking_send(ScanEvent::ScanComplete);
        tracing::info!(root = %root.display(), videos = sent, "Folder scan finished");
    }
}

/// Parse an `ffprobe` frame rate (`"30000/1001"` or `"29.97"`).
///
/// Returns 0.0 for anything unusable, including a zero denominator.
pub fn parse_frame_rate(raw: &str) -> f64 {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(1.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => raw.parse().unwrap_or(0.0),
    };
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        0.0
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

fn metadata_error(path: &str, message: impl Into<String>) -> Error {
    Error::Metadata {
        path: path.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl VideoIndex for LocalVideoIndex {
    async fn begin_scan(&self, root: &Path) -> Result<ScanStream> {
        let is_dir = tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::Scan {
                root: root.display().to_string(),
                message: "not a readable directory".to_string(),
            });
        }

        let (tx, stream) = ScanStream::channel(self.channel_capacity);
        let index = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || index.stream_folder(&root, &tx));
        Ok(stream)
    }

    async fn get_metadata(&self, path: &str) -> Result<VideoMetadata> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=r_frame_rate,duration",
                "-of",
                "json",
                path,
            ])
            .output()
            .await
            .map_err(|e| metadata_error(path, format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(metadata_error(
                path,
                format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| metadata_error(path, format!("unreadable ffprobe output: {}", e)))?;
        let stream = probe
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| metadata_error(path, "no video stream"))?;
        let rate = stream
            .r_frame_rate
            .ok_or_else(|| metadata_error(path, "frame rate not found"))?;

        let metadata = VideoMetadata {
            fps: parse_frame_rate(&rate),
            duration: stream
                .duration
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0.0),
        };
        tracing::debug!(path, fps = metadata.fps, duration = metadata.duration, "Probed video");
        Ok(metadata)
    }

    async fn preload_header(&self, path: &str) -> Result<()> {
        let file = tokio::fs::File::open(path).await?;
        let read = tokio::io::copy(&mut file.take(PRELOAD_HEADER_BYTES), &mut tokio::io::sink()).await?;
        tracing::trace!(path, bytes = read, "Header preloaded");
        Ok(())
    }
}
