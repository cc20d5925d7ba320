use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::services::LabelStore;
use crate::types::LabelFile;

/// Label file of a video: `<parent>/<stem>.json`.
pub fn label_path(video_path: &Path) -> Option<PathBuf> {
    let stem = video_path.file_stem()?;
    let parent = video_path.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(format!("{}.json", stem.to_string_lossy())))
}

/// Parsed label document of a video, if it has a readable one.
///
/// Read loosely so that hand-edited files with missing fields still count.
pub(crate) fn read_label_value(video_path: &Path) -> Option<serde_json::Value> {
    let path = label_path(video_path)?;
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Skipping unparseable label file");
            None
        }
    }
}

/// Number of events a session would load from a video's label file.
///
/// Uses [`LabelFile::parse`] so the count and the opened event list agree.
pub(crate) fn stored_event_count(video_path: &Path) -> usize {
    let Some(path) = label_path(video_path) else {
        return 0;
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return 0;
    };
    LabelFile::parse(&path.display().to_string(), &content)
        .map(|file| file.events.len())
        .unwrap_or(0)
}

/// Label files stored next to the videos they describe.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLabelStore;

fn resolve(video_path: &str) -> Result<PathBuf> {
    label_path(Path::new(video_path)).ok_or_else(|| Error::Persistence {
        path: video_path.to_string(),
        message: "invalid video path".to_string(),
    })
}

#[async_trait]
impl LabelStore for FsLabelStore {
    async fn load_labels(&self, video_path: &str) -> Result<Option<String>> {
        let path = resolve(video_path)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_labels(&self, video_path: &str, json: &str) -> Result<()> {
        let path = resolve(video_path)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::Persistence {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), bytes = json.len(), "Label file written");
        Ok(())
    }
}
