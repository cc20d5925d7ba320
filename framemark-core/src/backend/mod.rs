//! Local implementations of the collaborator traits.
//!
//! These talk to the filesystem, `ffprobe` and the OS directly:
//!
//! - [`LocalVideoIndex`]: folder listing and probing
//! - [`MediaRegistry`]: path to playable URL mapping for the media server
//! - [`FsLabelStore`]: `<stem>.json` label files next to each video
//! - [`DirectorySummary`]: folder-wide event report
//! - [`SystemTelemetry`]: process resource usage via `sysinfo`

mod index;
mod labels;
mod media;
mod summary;
mod telemetry;

pub use index::{parse_frame_rate, LocalVideoIndex, PRELOAD_HEADER_BYTES};
pub use labels::{label_path, FsLabelStore};
pub use media::MediaRegistry;
pub use summary::DirectorySummary;
pub use telemetry::SystemTelemetry;

use std::sync::Arc;

use crate::config::MediaConfig;
use crate::services::Services;

/// Wire the local collaborators into a [`Services`] bundle.
pub fn local_services(media: &MediaConfig) -> Services {
    Services {
        index: Arc::new(LocalVideoIndex::default()),
        media: Arc::new(MediaRegistry::new(&media.base_url)),
        labels: Arc::new(FsLabelStore),
        summary: Arc::new(DirectorySummary),
    }
}
