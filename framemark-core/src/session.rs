//! Active video session
//!
//! Holds the selected video's playable handle, frame rate and event list, and
//! turns playback time updates into frame positions. Exactly one session is
//! active; selecting another video replaces it wholesale.

use crate::config::{MAX_SCROLL_SENSITIVITY, MIN_SCROLL_SENSITIVITY};
use crate::services::{LabelStore, MediaServer, VideoIndex};
use crate::types::{frame_at, LabelEvent, LabelFile, PlayableHandle, VideoCatalogEntry};

/// State of the selected video.
#[derive(Debug, Clone)]
pub struct VideoSession {
    pub entry: VideoCatalogEntry,
    pub playable: Option<PlayableHandle>,
    /// 0.0 until metadata has loaded
    pub fps: f64,
    pub duration_secs: f64,
    pub total_frames: u64,
    events: Vec<LabelEvent>,
    current_frame: Option<u64>,
    pending_seek_frame: Option<u64>,
}

impl VideoSession {
    fn new(entry: VideoCatalogEntry) -> Self {
        Self {
            entry,
            playable: None,
            fps: 0.0,
            duration_secs: 0.0,
            total_frames: 0,
            events: Vec::new(),
            current_frame: None,
            pending_seek_frame: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    /// Whether frame positions can be derived.
    pub fn has_frame_rate(&self) -> bool {
        self.fps > 0.0
    }

    /// Events in creation order.
    pub fn events(&self) -> &[LabelEvent] {
        &self.events
    }

    /// Frame under the playhead, once fps is known and time has been reported.
    pub fn current_frame(&self) -> Option<u64> {
        if self.has_frame_rate() {
            self.current_frame
        } else {
            None
        }
    }

    pub(crate) fn push_event(&mut self, event: LabelEvent) {
        self.events.push(event);
    }

    pub(crate) fn remove_event(&mut self, index: usize) -> Option<LabelEvent> {
        (index < self.events.len()).then(|| self.events.remove(index))
    }

    /// Snapshot of the label document for this video.
    pub fn label_file(&self) -> LabelFile {
        LabelFile::new(&self.entry.path, self.fps, &self.events)
    }

    /// Record a playback time update.
    pub fn on_time_update(&mut self, time_secs: f64) -> Option<u64> {
        if let Some(frame) = frame_at(time_secs, self.fps) {
            self.current_frame = Some(frame);
        }
        self.current_frame()
    }

    /// Ask for a seek to `frame` as soon as playback is ready.
    pub fn request_seek(&mut self, frame: u64) {
        self.pending_seek_frame = Some(frame);
    }

    pub fn pending_seek(&self) -> Option<u64> {
        self.pending_seek_frame
    }

    /// The playback surface reports it can play.
    ///
    /// Returns the seek target in seconds when a deferred seek is pending and
    /// the frame rate is known. The request is consumed.
    pub fn on_playback_ready(&mut self) -> Option<f64> {
        if !self.has_frame_rate() {
            return None;
        }
        let frame = self.pending_seek_frame.take()?;
        tracing::debug!(path = %self.entry.path, frame, "Applying deferred seek");
        Some(frame as f64 / self.fps)
    }

    /// Seek target for the start of the event at `index`.
    pub fn seek_to_event(&self, index: usize) -> Option<f64> {
        let event = self.events.get(index)?;
        self.has_frame_rate()
            .then(|| event.start_frame as f64 / self.fps)
    }

    /// Wheel scrubbing: move `direction.signum() * sensitivity` frames from
    /// `time_secs`, clamped to the video.
    pub fn scroll_seek(&self, time_secs: f64, direction: f64, sensitivity: u32) -> Option<f64> {
        if !self.has_frame_rate() || direction == 0.0 {
            return None;
        }
        let frames = direction.signum() * f64::from(sensitivity);
        let target = time_secs + frames / self.fps;
        Some(target.clamp(0.0, self.duration_secs.max(0.0)))
    }
}

/// Owns the active [`VideoSession`].
#[derive(Debug)]
pub struct SessionController {
    session: Option<VideoSession>,
    scroll_sensitivity: u32,
}

impl Default for SessionController {
    fn default() -> Self {
        Self {
            session: None,
            scroll_sensitivity: MIN_SCROLL_SENSITIVITY,
        }
    }
}

impl SessionController {
    pub fn new(scroll_sensitivity: u32) -> Self {
        let mut controller = Self::default();
        controller.set_scroll_sensitivity(scroll_sensitivity);
        controller
    }

    pub fn session(&self) -> Option<&VideoSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut VideoSession> {
        self.session.as_mut()
    }

    /// Drop the active session, e.g. when the catalog is reset.
    pub fn clear(&mut self) {
        self.session = None;
    }

    /// Frames moved per wheel tick, clamped to 1..=30.
    pub fn scroll_sensitivity(&self) -> u32 {
        self.scroll_sensitivity
    }

    pub fn set_scroll_sensitivity(&mut self, frames: u32) {
        self.scroll_sensitivity = frames.clamp(MIN_SCROLL_SENSITIVITY, MAX_SCROLL_SENSITIVITY);
    }

    /// Select `entry` and load everything the session needs.
    ///
    /// Collaborator failures are logged and leave the session in a usable
    /// but degraded state: no handle, `fps == 0` or an empty event list.
    pub async fn select_video(
        &mut self,
        entry: VideoCatalogEntry,
        index: &dyn VideoIndex,
        media: &dyn MediaServer,
        labels: &dyn LabelStore,
    ) -> &VideoSession {
        tracing::info!(path = %entry.path, "Selecting video");
        let mut session = VideoSession::new(entry);

        match media.register_video(&session.entry.path).await {
            Ok(handle) => session.playable = Some(handle),
            Err(e) => {
                tracing::warn!(path = %session.entry.path, error = %e, "Failed to register video")
            }
        }

        match index.get_metadata(&session.entry.path).await {
            Ok(meta) => {
                session.fps = meta.fps;
                session.duration_secs = meta.duration;
                session.total_frames = (meta.duration * meta.fps).round().max(0.0) as u64;
                tracing::debug!(
                    path = %session.entry.path,
                    fps = meta.fps,
                    duration = meta.duration,
                    total_frames = session.total_frames,
                    "Loaded video metadata"
                );
            }
            Err(e) => {
                tracing::warn!(path = %session.entry.path, error = %e, "Failed to load video metadata")
            }
        }

        session.events = load_events(labels, &session.entry.path).await;
        self.session.insert(session)
    }
}

/// Events stored for `video_path`; empty when absent or unreadable.
async fn load_events(labels: &dyn LabelStore, video_path: &str) -> Vec<LabelEvent> {
    let content = match labels.load_labels(video_path).await {
        Ok(Some(content)) => content,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %video_path, error = %e, "Failed to read labels");
            return Vec::new();
        }
    };

    match LabelFile::parse(video_path, &content) {
        Ok(file) => file.events,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable label file");
            Vec::new()
        }
    }
}
