use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::labels::read_label_value;
use crate::error::{Error, Result};
use crate::services::SummaryService;
use crate::types::{is_video_file, GlobalEvent, SummaryReport, UNKNOWN_LABEL};

const DEFAULT_FPS: f64 = 30.0;

/// Builds a [`SummaryReport`] from the label files in one folder.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectorySummary;

impl DirectorySummary {
    /// Synchronous body of [`SummaryService::get_summary`].
    pub fn collect(root: &Path) -> Result<SummaryReport> {
        let entries = std::fs::read_dir(root).map_err(|e| Error::SummaryLoad {
            root: root.display().to_string(),
            message: e.to_string(),
        })?;

        let mut videos: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_video_file(path))
            .collect();
        videos.sort();

        let mut report = SummaryReport::default();
        for video in &videos {
            report.total_videos += 1;
            let Some(value) = read_label_value(video) else {
                continue;
            };
            let Some(events) = value["events"].as_array() else {
                continue;
            };
            if !events.is_empty() {
                report.total_labeled_videos += 1;
            }

            let video_name = video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fps = value["fps"].as_f64().unwrap_or(DEFAULT_FPS);
            for event in events {
                report.total_events += 1;
                report.events.push(GlobalEvent {
                    video_name: video_name.clone(),
                    label: event["label"].as_str().unwrap_or(UNKNOWN_LABEL).to_string(),
                    start_frame: event["start_frame"].as_u64().unwrap_or(0),
                    end_frame: event["end_frame"].as_u64().unwrap_or(0),
                    fps,
                });
            }
        }

        tracing::info!(
            root = %root.display(),
            videos = report.total_videos,
            labeled = report.total_labeled_videos,
            events = report.total_events,
            "Summary collected"
        );
        Ok(report)
    }
}

#[async_trait]
impl SummaryService for DirectorySummary {
    async fn get_summary(&self, root: &Path) -> Result<SummaryReport> {
        let root = root.to_path_buf();
        let display = root.display().to_string();
        tokio::task::spawn_blocking(move || Self::collect(&root))
            .await
            .map_err(|e| Error::SummaryLoad {
                root: display,
                message: e.to_string(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_summary_counts_and_defaults() {
        let dir = TempDir::new().unwrap();
        for name in ["a.mp4", "b.mp4", "c.webm"] {
            std::fs::write(dir.path().join(name), b"fake").unwrap();
        }
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"video_name":"a.mp4","fps":25.0,"events":[
                {"label":"accident","start_frame":10,"end_frame":40,"before_start_frame":0},
                {"start_frame":50}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"events":[]}"#).unwrap();
        std::fs::write(dir.path().join("orphan.json"), r#"{"events":[{}]}"#).unwrap();

        let report = DirectorySummary.get_summary(dir.path()).await.unwrap();
        assert_eq!(report.total_videos, 3);
        assert_eq!(report.total_labeled_videos, 1);
        assert_eq!(report.total_events, 2);

        let first = &report.events[0];
        assert_eq!(first.video_name, "a.mp4");
        assert_eq!(first.label, "accident");
        assert_eq!((first.start_frame, first.end_frame), (10, 40));
        assert_eq!(first.fps, 25.0);

        let second = &report.events[1];
        assert_eq!(second.label, "unknown");
        assert_eq!((second.start_frame, second.end_frame), (50, 0));
    }

    #[tokio::test]
    async fn test_fps_defaults_to_thirty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"fake").unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"events":[{"label":"x","start_frame":1,"end_frame":2}]}"#,
        )
        .unwrap();

        let report = DirectorySummary.get_summary(dir.path()).await.unwrap();
        assert_eq!(report.events[0].fps, 30.0);
    }

    #[tokio::test]
    async fn test_missing_folder_is_a_summary_error() {
        let dir = TempDir::new().unwrap();
        let err = DirectorySummary
            .get_summary(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SummaryLoad { .. }));
    }
}
