//! Collaborator contracts
//!
//! The engine never touches the filesystem, ffprobe or the media server
//! directly. Everything it needs from the outside world goes through one of
//! these traits, so front ends can plug in the local implementations from
//! [`crate::backend`] and tests can plug in fakes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::Result;
use crate::types::{AppStats, PlayableHandle, SummaryReport, VideoCatalogEntry, VideoMetadata};

/// Message on a scan stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A video was found; arrives in traversal order
    EntryDiscovered(VideoCatalogEntry),
    /// Terminator, sent once after the last entry
    ScanComplete,
}

/// Receiving half of an in-flight scan.
///
/// Dropping the stream closes the channel, which is how the producer learns
/// that nobody is listening anymore.
#[derive(Debug)]
pub struct ScanStream {
    rx: mpsc::Receiver<ScanEvent>,
}

impl ScanStream {
    /// Create a bounded scan channel.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ScanEvent>, ScanStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, ScanStream { rx })
    }

    /// Wait for the next event. `None` once the producer is gone.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is already queued.
    pub fn try_recv(&mut self) -> std::result::Result<ScanEvent, TryRecvError> {
        self.rx.try_recv()
    }
}

/// Discovers videos and probes them.
#[async_trait]
pub trait VideoIndex: Send + Sync {
    /// Start streaming the videos under `root`.
    async fn begin_scan(&self, root: &Path) -> Result<ScanStream>;

    /// Probe frame rate and duration.
    async fn get_metadata(&self, path: &str) -> Result<VideoMetadata>;

    /// Best-effort hint that `path` is about to be played.
    async fn preload_header(&self, path: &str) -> Result<()>;
}

/// Hands out URLs the playback surface can load.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn register_video(&self, path: &str) -> Result<PlayableHandle>;
}

/// Reads and writes per-video label documents.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Raw label JSON for `video_path`, or `None` when no file exists.
    async fn load_labels(&self, video_path: &str) -> Result<Option<String>>;

    /// Replace the label document for `video_path`.
    async fn save_labels(&self, video_path: &str, json: &str) -> Result<()>;
}

/// Reports process resource usage.
#[async_trait]
pub trait Telemetry: Send + Sync {
    async fn get_stats(&self) -> Result<AppStats>;
}

/// Builds the cross-folder event report.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn get_summary(&self, root: &Path) -> Result<SummaryReport>;
}

/// The collaborators the workbench talks to.
#[derive(Clone)]
pub struct Services {
    pub index: Arc<dyn VideoIndex>,
    pub media: Arc<dyn MediaServer>,
    pub labels: Arc<dyn LabelStore>,
    pub summary: Arc<dyn SummaryService>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
