//! Core domain types for framemark
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Catalog** | The videos discovered in the currently opened root folder |
//! | **Session** | The one video currently selected for annotation |
//! | **Frame index** | `round(time_seconds * fps)`, the unit events are recorded in |
//! | **Event** | A labeled `[start_frame, end_frame]` interval on a video |
//! | **Warning window** | Fixed 5 second lead-in before an event, stored as `before_start_frame` |
//! | **Label file** | `<stem>.json` next to the video, rewritten in full on every change |

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Length of the lead-in window before every event, in seconds.
pub const WARNING_WINDOW_SECS: f64 = 5.0;

// ============================================
// Catalog
// ============================================

/// One video discovered by a folder scan.
///
/// Identity is `path`; the collaborator guarantees uniqueness within a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCatalogEntry {
    /// Absolute path of the video file
    pub path: String,
    /// Number of events stored in the video's label file
    pub event_count: usize,
    /// Container duration in seconds (0.0 when unknown)
    pub duration_sec: f64,
    /// Modification time in seconds since the Unix epoch
    pub last_modified: u64,
}

impl VideoCatalogEntry {
    /// File name of the video, without its directory.
    pub fn file_name(&self) -> &str {
        basename(&self.path)
    }

    /// Whether any events have been recorded for this video.
    pub fn is_labeled(&self) -> bool {
        self.event_count > 0
    }
}

/// Frame rate and duration as probed from the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub duration: f64,
}

/// Opaque URL the playback surface can load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayableHandle(pub String);

impl PlayableHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// Events
// ============================================

/// Label given to stored events that carry none.
pub const UNKNOWN_LABEL: &str = "unknown";

fn unknown_label() -> String {
    UNKNOWN_LABEL.to_string()
}

/// A labeled interval on a video's frame timeline.
///
/// Events built with [`LabelEvent::from_marks`] satisfy
/// `before_start_frame <= start_frame <= end_frame`. Events read back from a
/// label file are taken as-is, with missing fields defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEvent {
    #[serde(default = "unknown_label")]
    pub label: String,
    #[serde(default)]
    pub start_frame: u64,
    #[serde(default)]
    pub end_frame: u64,
    #[serde(default)]
    pub before_start_frame: u64,
}

impl LabelEvent {
    /// Build an event from two marks at the given frame rate.
    ///
    /// `before_start_frame` is computed once here and never revisited,
    /// even if the video's fps is later corrected.
    pub fn from_marks(
        label: impl Into<String>,
        start_frame: u64,
        end_frame: u64,
        fps: f64,
    ) -> Result<Self> {
        if end_frame < start_frame {
            return Err(Error::ReversedEvent {
                start_frame,
                end_frame,
            });
        }

        Ok(Self {
            label: label.into(),
            start_frame,
            end_frame,
            before_start_frame: warning_start(start_frame, fps),
        })
    }

    /// Length of the event in frames.
    pub fn duration_frames(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Where `frame` falls relative to this event.
    pub fn zone_at(&self, frame: u64) -> Option<EventZone> {
        if frame >= self.start_frame && frame <= self.end_frame {
            Some(EventZone::Active)
        } else if frame >= self.before_start_frame && frame < self.start_frame {
            Some(EventZone::Warning)
        } else {
            None
        }
    }
}

/// Position of the playhead relative to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventZone {
    /// Inside the warning window leading up to the event
    Warning,
    /// Inside the event itself
    Active,
}

/// `max(0, start - floor(5 * fps))`
pub fn warning_start(start_frame: u64, fps: f64) -> u64 {
    let lead = (WARNING_WINDOW_SECS * fps.max(0.0)).floor() as u64;
    start_frame.saturating_sub(lead)
}

/// Convert a playback time to a frame index.
///
/// Returns `None` while the frame rate is unknown.
pub fn frame_at(time_secs: f64, fps: f64) -> Option<u64> {
    if fps <= 0.0 || !fps.is_finite() {
        return None;
    }
    Some((time_secs.max(0.0) * fps).round() as u64)
}

/// The document stored in a video's label file.
///
/// Only `events` matters when reading; files written by other tools may
/// leave out the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFile {
    /// Base name of the video file
    #[serde(default)]
    pub video_name: String,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub events: Vec<LabelEvent>,
}

impl LabelFile {
    /// Snapshot the full event list of `video_path`.
    pub fn new(video_path: &str, fps: f64, events: &[LabelEvent]) -> Self {
        Self {
            video_name: basename(video_path).to_string(),
            fps,
            events: events.to_vec(),
        }
    }

    /// Parse label file content.
    ///
    /// Any JSON object is accepted; one without an `events` array has no
    /// events.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::LabelParse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Serialize with 4-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| Error::Persistence {
            path: self.video_name.clone(),
            message: format!("label JSON not UTF-8: {}", e),
        })
    }
}

// ============================================
// Summary
// ============================================

/// One event row in the cross-folder summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalEvent {
    pub video_name: String,
    pub label: String,
    pub start_frame: u64,
    pub end_frame: u64,
    pub fps: f64,
}

impl GlobalEvent {
    /// Length in frames; saturates for rows read from hand-edited files.
    pub fn duration_frames(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Length in seconds, or 0.0 when fps is unknown.
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.duration_frames() as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Snapshot of every event in a folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub total_videos: usize,
    pub total_labeled_videos: usize,
    pub total_events: usize,
    pub events: Vec<GlobalEvent>,
}

// ============================================
// Telemetry
// ============================================

/// Resource usage of the running application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStats {
    /// Process CPU usage in percent
    pub cpu_usage: f32,
    /// Process resident memory in bytes
    pub memory_usage: u64,
    /// Total system memory in bytes
    pub total_memory: u64,
    /// GPU utilisation in percent
    pub gpu_usage: f32,
}

/// Last path component, accepting both `/` and `\` separators.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Whether `name` is a suffix of `path`, and if so whether it starts on a
/// path separator boundary.
pub fn suffix_match(path: &str, name: &str) -> Option<bool> {
    if name.is_empty() || !path.ends_with(name) {
        return None;
    }
    let head = &path[..path.len() - name.len()];
    Some(head.is_empty() || head.ends_with(['/', '\\']))
}

/// Video file extensions recognised by the local index.
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "webm", "mkv", "avi", "mov", "flv", "wmv", "m4v"];

/// Whether `path` has one of [`VIDEO_EXTENSIONS`], case-insensitively.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_window_clamps_at_zero() {
        let event = LabelEvent::from_marks("accident", 100, 130, 30.0).unwrap();
        assert_eq!(event.before_start_frame, 0);
        assert_eq!(event.start_frame, 100);
        assert_eq!(event.end_frame, 130);
    }

    #[test]
    fn test_warning_window_subtracts_five_seconds() {
        let event = LabelEvent::from_marks("accident", 200, 260, 30.0).unwrap();
        assert_eq!(event.before_start_frame, 50);
    }

    #[test]
    fn test_warning_window_floors_fractional_fps() {
        // 5 * 29.97 = 149.85 -> 149
        assert_eq!(warning_start(1000, 29.97), 851);
        assert_eq!(warning_start(10, 0.0), 10);
    }

    #[test]
    fn test_event_invariant_holds_across_fps() {
        for fps in [0.0, 1.0, 23.976, 25.0, 29.97, 60.0, 240.0] {
            for start in [0u64, 1, 149, 150, 151, 10_000] {
                let event = LabelEvent::from_marks("x", start, start + 3, fps).unwrap();
                assert!(event.before_start_frame <= event.start_frame);
                assert!(event.start_frame <= event.end_frame);
                assert_eq!(event.before_start_frame, warning_start(start, fps));
            }
        }
    }

    #[test]
    fn test_reversed_marks_rejected() {
        let err = LabelEvent::from_marks("accident", 130, 100, 30.0).unwrap_err();
        assert!(matches!(
            err,
            Error::ReversedEvent {
                start_frame: 130,
                end_frame: 100
            }
        ));
    }

    #[test]
    fn test_zero_length_event_allowed() {
        let event = LabelEvent::from_marks("accident", 42, 42, 30.0).unwrap();
        assert_eq!(event.duration_frames(), 0);
    }

    #[test]
    fn test_frame_at_rounds() {
        assert_eq!(frame_at(1.0, 30.0), Some(30));
        assert_eq!(frame_at(1.016, 30.0), Some(30));
        assert_eq!(frame_at(1.02, 30.0), Some(31));
        assert_eq!(frame_at(5.0, 0.0), None);
    }

    #[test]
    fn test_zone_at() {
        let event = LabelEvent::from_marks("accident", 200, 260, 30.0).unwrap();
        assert_eq!(event.zone_at(10), None);
        assert_eq!(event.zone_at(50), Some(EventZone::Warning));
        assert_eq!(event.zone_at(199), Some(EventZone::Warning));
        assert_eq!(event.zone_at(200), Some(EventZone::Active));
        assert_eq!(event.zone_at(260), Some(EventZone::Active));
        assert_eq!(event.zone_at(261), None);
    }

    #[test]
    fn test_label_file_uses_four_space_indent() {
        let events = vec![LabelEvent::from_marks("accident", 200, 260, 30.0).unwrap()];
        let file = LabelFile::new("/videos/clip.mp4", 30.0, &events);
        let json = file.to_pretty_json().unwrap();

        assert!(json.contains("\n    \"video_name\": \"clip.mp4\""));
        assert!(json.contains("\"before_start_frame\": 50"));
        assert_eq!(LabelFile::parse("clip", &json).unwrap(), file);
    }

    #[test]
    fn test_empty_event_list_serializes_as_empty_array() {
        let file = LabelFile::new("/videos/clip.mp4", 25.0, &[]);
        let json = file.to_pretty_json().unwrap();
        assert!(json.contains("\"events\": []"));
    }

    #[test]
    fn test_label_file_without_header_fields_keeps_events() {
        let file = LabelFile::parse(
            "/videos/clip.json",
            r#"{"events":[{"label":"crash","start_frame":30,"end_frame":60,"before_start_frame":0},{}]}"#,
        )
        .unwrap();
        assert_eq!(file.video_name, "");
        assert_eq!(file.events.len(), 2);
        assert_eq!(file.events[0].label, "crash");
        assert_eq!(file.events[1].label, UNKNOWN_LABEL);
        assert_eq!(file.events[1].end_frame, 0);

        assert!(LabelFile::parse("/videos/clip.json", "{}").unwrap().events.is_empty());
    }

    #[test]
    fn test_label_file_parse_error() {
        let err = LabelFile::parse("/videos/clip.json", "{not json").unwrap_err();
        assert!(matches!(err, Error::LabelParse { .. }));
    }

    #[test]
    fn test_basename_handles_both_separators() {
        assert_eq!(basename("/a/b/clip.mp4"), "clip.mp4");
        assert_eq!(basename("C:\\videos\\clip.mp4"), "clip.mp4");
        assert_eq!(basename("clip.mp4"), "clip.mp4");
    }

    #[test]
    fn test_suffix_match() {
        assert_eq!(suffix_match("/videos/clip.mp4", "clip.mp4"), Some(true));
        assert_eq!(suffix_match("/videos/clip.mp4", "videos/clip.mp4"), Some(true));
        assert_eq!(suffix_match("/videos/my_clip.mp4", "clip.mp4"), Some(false));
        assert_eq!(suffix_match("clip.mp4", "clip.mp4"), Some(true));
        assert_eq!(suffix_match("/videos/clip.mp4", "other.mp4"), None);
        assert_eq!(suffix_match("/videos/clip.mp4", ""), None);
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("/v/a.MP4")));
        assert!(is_video_file(Path::new("/v/a.m4v")));
        assert!(!is_video_file(Path::new("/v/a.json")));
        assert!(!is_video_file(Path::new("/v/noext")));
    }

    #[test]
    fn test_global_event_duration_seconds() {
        let row = GlobalEvent {
            video_name: "clip.mp4".to_string(),
            label: "accident".to_string(),
            start_frame: 30,
            end_frame: 90,
            fps: 30.0,
        };
        assert_eq!(row.duration_frames(), 60);
        assert!((row.duration_seconds() - 2.0).abs() < f64::EPSILON);
    }
}
