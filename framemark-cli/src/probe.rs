//! Frame-rate override for machines without `ffprobe`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use framemark_core::{Result, ScanStream, VideoIndex, VideoMetadata};

/// Wraps a [`VideoIndex`] and reports a fixed frame rate for every video.
///
/// The duration still comes from the wrapped index when it can probe one.
pub struct AssumedRateIndex {
    inner: Arc<dyn VideoIndex>,
    fps: f64,
}

impl AssumedRateIndex {
    pub fn wrap(inner: Arc<dyn VideoIndex>, fps: f64) -> Arc<dyn VideoIndex> {
        Arc::new(Self { inner, fps })
    }
}

#[async_trait]
impl VideoIndex for AssumedRateIndex {
    async fn begin_scan(&self, root: &Path) -> Result<ScanStream> {
        self.inner.begin_scan(root).await
    }

    async fn get_metadata(&self, path: &str) -> Result<VideoMetadata> {
        let duration = match self.inner.get_metadata(path).await {
            Ok(meta) => meta.duration,
            Err(e) => {
                tracing::debug!(path, error = %e, "Probe failed, using assumed frame rate");
                0.0
            }
        };
        Ok(VideoMetadata {
            fps: self.fps,
            duration,
        })
    }

    async fn preload_header(&self, path: &str) -> Result<()> {
        self.inner.preload_header(path).await
    }
}
