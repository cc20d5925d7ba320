//! Preload scheduler
//!
//! Warms up the next unlabeled videos after the current selection so that
//! moving on to them feels instant.
//!
//! ## Generations
//!
//! The candidate set is derived from the sorted catalog and the selection.
//! Whenever it changes the scheduler starts a new generation: the previous
//! warm-up task is aborted, its slots and progress are dropped, and any
//! result still tagged with the old generation is ignored. Within one
//! generation buffering progress per path only ever goes up.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::{MediaServer, VideoIndex};
use crate::types::{PlayableHandle, VideoCatalogEntry};

/// Upcoming unlabeled videos to warm up.
pub const PRELOAD_LOOKAHEAD: usize = 2;

/// Progress reported once playback is ready but no buffer data arrived yet.
pub const READY_PROGRESS_FLOOR: f64 = 10.0;

/// A warmed-up video waiting to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadSlot {
    pub entry: VideoCatalogEntry,
    pub playable: PlayableHandle,
    /// 0..=100
    pub buffered_percent: f64,
}

/// Message from the warm-up task.
#[derive(Debug)]
struct Registered {
    generation: u64,
    entry: VideoCatalogEntry,
    playable: PlayableHandle,
}

/// Pick up to [`PRELOAD_LOOKAHEAD`] unlabeled entries after `selected`.
///
/// Returns nothing when there is no selection or it is not in `view`.
pub fn select_candidates(
    view: &[VideoCatalogEntry],
    selected: Option<&str>,
) -> Vec<VideoCatalogEntry> {
    let Some(selected) = selected else {
        return Vec::new();
    };
    let Some(position) = view.iter().position(|e| e.path == selected) else {
        return Vec::new();
    };

    view[position + 1..]
        .iter()
        .filter(|e| e.event_count == 0)
        .take(PRELOAD_LOOKAHEAD)
        .cloned()
        .collect()
}

/// Tracks warm-up generations and buffering progress.
pub struct PreloadScheduler {
    index: Arc<dyn VideoIndex>,
    media: Arc<dyn MediaServer>,
    generation: u64,
    candidates: Vec<String>,
    slots: Vec<PreloadSlot>,
    progress: HashMap<String, f64>,
    task: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Registered>,
    rx: mpsc::UnboundedReceiver<Registered>,
}

impl std::fmt::Debug for PreloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadScheduler")
            .field("generation", &self.generation)
            .field("candidates", &self.candidates)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl PreloadScheduler {
    pub fn new(index: Arc<dyn VideoIndex>, media: Arc<dyn MediaServer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            index,
            media,
            generation: 0,
            candidates: Vec::new(),
            slots: Vec::new(),
            progress: HashMap::new(),
            task: None,
            tx,
            rx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Paths chosen for the current generation, in view order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Slots registered so far in the current generation.
    pub fn slots(&self) -> &[PreloadSlot] {
        &self.slots
    }

    /// Buffering progress for `path` in the current generation.
    pub fn progress(&self, path: &str) -> Option<f64> {
        self.progress.get(path).copied()
    }

    /// Re-derive candidates after the view or selection changed.
    ///
    /// Returns `true` when a new generation was started. Must be called
    /// inside a tokio runtime.
    pub fn recompute(&mut self, view: &[VideoCatalogEntry], selected: Option<&str>) -> bool {
        let next = select_candidates(view, selected);
        let next_paths: Vec<String> = next.iter().map(|e| e.path.clone()).collect();
        if next_paths == self.candidates && self.generation > 0 {
            return false;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
        self.candidates = next_paths;
        self.slots.clear();
        self.progress.clear();

        tracing::debug!(
            generation = self.generation,
            candidates = ?self.candidates,
            "Preload candidates changed"
        );

        if !next.is_empty() {
            self.task = Some(self.spawn_warm_up(next));
        }
        true
    }

    fn spawn_warm_up(&self, entries: Vec<VideoCatalogEntry>) -> JoinHandle<()> {
        let generation = self.generation;
        let index = Arc::clone(&self.index);
        let media = Arc::clone(&self.media);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            for entry in entries {
                if let Err(e) = index.preload_header(&entry.path).await {
                    tracing::debug!(path = %entry.path, error = %e, "Preload hint failed");
                }
                match media.register_video(&entry.path).await {
                    Ok(playable) => {
                        let msg = Registered {
                            generation,
                            entry,
                            playable,
                        };
                        if tx.send(msg).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path, error = %e, "Failed to register video for preloading");
                    }
                }
            }
        })
    }

    /// Register slots the warm-up task has finished. Stale ones are dropped.
    pub fn poll(&mut self) -> usize {
        let mut added = 0;
        while let Ok(msg) = self.rx.try_recv() {
            if self.accept(msg) {
                added += 1;
            }
        }
        added
    }

    /// Wait for the current generation's warm-up task to finish and register
    /// its slots.
    pub async fn settle(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Preload task failed");
                }
            }
        }
        self.poll();
    }

    fn accept(&mut self, msg: Registered) -> bool {
        if msg.generation != self.generation {
            tracing::trace!(
                stale = msg.generation,
                current = self.generation,
                path = %msg.entry.path,
                "Discarding stale preload"
            );
            return false;
        }
        tracing::debug!(path = %msg.entry.path, url = %msg.playable, "Preload slot ready");
        let buffered_percent = self.progress(&msg.entry.path).unwrap_or(0.0);
        self.slots.push(PreloadSlot {
            entry: msg.entry,
            playable: msg.playable,
            buffered_percent,
        });
        true
    }

    /// Buffer callback from a preloading player.
    ///
    /// Ignored when `generation` is stale or the path is not a candidate.
    pub fn on_buffer_progress(
        &mut self,
        generation: u64,
        path: &str,
        buffered_end: f64,
        total_duration: f64,
    ) {
        if total_duration <= 0.0 || buffered_end < 0.0 {
            return;
        }
        let percent = (buffered_end / total_duration * 100.0).clamp(0.0, 100.0);
        self.raise_progress(generation, path, percent);
    }

    /// Ready-to-play callback from a preloading player.
    pub fn on_ready(&mut self, generation: u64, path: &str) {
        if self.progress.contains_key(path) {
            return;
        }
        self.raise_progress(generation, path, READY_PROGRESS_FLOOR);
    }

    fn raise_progress(&mut self, generation: u64, path: &str, percent: f64) {
        if generation != self.generation || !self.candidates.iter().any(|c| c == path) {
            return;
        }
        let value = self.progress.entry(path.to_string()).or_insert(0.0);
        if percent > *value {
            *value = percent;
        }
        let value = *value;
        if let Some(slot) = self.slots.iter_mut().find(|s| s.entry.path == path) {
            slot.buffered_percent = value;
        }
    }
}

impl Drop for PreloadScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
