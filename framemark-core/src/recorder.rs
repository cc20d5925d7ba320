//! Event-marking state machine
//!
//! ```text
//!            toggle_mark (video selected, fps > 0)
//!   ┌──────┐ ────────────────────────────────────► ┌───────────────────────┐
//!   │ Idle │                                       │ Recording{start_frame}│
//!   └──────┘ ◄──────────────────────────────────── └───────────────────────┘
//!            toggle_mark: event appended, or rejected when end < start
//! ```
//!
//! The recorder only decides what happened. Applying the outcome to the
//! catalog and queueing the label write is the workbench's job.

use crate::error::Error;
use crate::session::VideoSession;
use crate::types::LabelEvent;

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording { start_frame: u64 },
}

/// Result of pressing the mark key.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// No video, or its frame rate is not known yet
    Ignored,
    /// Recording started at this frame
    Started { start_frame: u64 },
    /// Recording stopped and the event was appended to the session
    Recorded { index: usize, event: LabelEvent },
    /// The playhead moved before the start mark; nothing was recorded
    Rejected { start_frame: u64, end_frame: u64 },
}

/// Toggles between idle and recording and builds events.
#[derive(Debug, Clone)]
pub struct AnnotationRecorder {
    state: RecorderState,
    default_label: String,
}

impl AnnotationRecorder {
    pub fn new(default_label: impl Into<String>) -> Self {
        Self {
            state: RecorderState::Idle,
            default_label: default_label.into(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Back to idle; any half-made recording is dropped.
    pub fn reset(&mut self) {
        self.state = RecorderState::Idle;
    }

    /// Press the mark key against `session`.
    pub fn toggle_mark(&mut self, session: Option<&mut VideoSession>) -> MarkOutcome {
        let Some(session) = session else {
            return MarkOutcome::Ignored;
        };
        let Some(frame) = session.current_frame() else {
            return MarkOutcome::Ignored;
        };

        match self.state {
            RecorderState::Idle => {
                self.state = RecorderState::Recording { start_frame: frame };
                tracing::debug!(path = %session.path(), frame, "Recording started");
                MarkOutcome::Started { start_frame: frame }
            }
            RecorderState::Recording { start_frame } => {
                self.state = RecorderState::Idle;
                match LabelEvent::from_marks(&self.default_label, start_frame, frame, session.fps) {
                    Ok(event) => {
                        session.push_event(event.clone());
                        let index = session.events().len() - 1;
                        tracing::info!(
                            path = %session.path(),
                            start_frame = event.start_frame,
                            end_frame = event.end_frame,
                            before_start_frame = event.before_start_frame,
                            "Event recorded"
                        );
                        MarkOutcome::Recorded { index, event }
                    }
                    Err(Error::ReversedEvent {
                        start_frame,
                        end_frame,
                    }) => {
                        tracing::warn!(
                            path = %session.path(),
                            start_frame,
                            end_frame,
                            "Rejected recording that ends before it starts"
                        );
                        MarkOutcome::Rejected {
                            start_frame,
                            end_frame,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %session.path(), error = %e, "Failed to build event");
                        MarkOutcome::Ignored
                    }
                }
            }
        }
    }
}
