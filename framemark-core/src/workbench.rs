//! The owned application context
//!
//! [`Workbench`] wires the engine components together. Front ends hold one
//! and drive it through named operations; each operation keeps the derived
//! pieces (catalog view, preload candidates, persisted label files) in step
//! with the change it makes.

use std::path::{Path, PathBuf};

use crate::catalog::{CatalogSortKey, CatalogStore, CatalogView};
use crate::config::Config;
use crate::persist::{CommandId, PersistenceQueue};
use crate::preload::PreloadScheduler;
use crate::recorder::{AnnotationRecorder, MarkOutcome};
use crate::scan::{ScanIngestion, ScanProgress};
use crate::services::Services;
use crate::session::{SessionController, VideoSession};
use crate::sort::SortDirection;
use crate::summary::{SummaryAggregator, SummarySortKey};
use crate::types::{GlobalEvent, VideoCatalogEntry};

/// Settings the workbench takes from [`Config`].
#[derive(Debug, Clone)]
pub struct WorkbenchOptions {
    pub default_label: String,
    pub scroll_sensitivity: u32,
}

impl Default for WorkbenchOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WorkbenchOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_label: config.labels.default_label.clone(),
            scroll_sensitivity: config.session.scroll_sensitivity,
        }
    }
}

/// Engine state for one operator.
#[derive(Debug)]
pub struct Workbench {
    services: Services,
    root: Option<PathBuf>,
    catalog: CatalogStore,
    view: CatalogView,
    scan: ScanIngestion,
    session: SessionController,
    recorder: AnnotationRecorder,
    preload: PreloadScheduler,
    summary: SummaryAggregator,
    persistence: PersistenceQueue,
    last_write: Option<CommandId>,
}

impl Workbench {
    /// Must be called inside a tokio runtime; background writers are spawned.
    pub fn new(services: Services, options: WorkbenchOptions) -> Self {
        let preload = PreloadScheduler::new(services.index.clone(), services.media.clone());
        let persistence = PersistenceQueue::spawn(services.labels.clone());
        Self {
            root: None,
            catalog: CatalogStore::new(),
            view: CatalogView::new(),
            scan: ScanIngestion::new(),
            session: SessionController::new(options.scroll_sensitivity),
            recorder: AnnotationRecorder::new(options.default_label),
            preload,
            summary: SummaryAggregator::new(),
            persistence,
            last_write: None,
            services,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Folder of the most recent scan.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn session(&self) -> Option<&VideoSession> {
        self.session.session()
    }

    pub fn recorder(&self) -> &AnnotationRecorder {
        &self.recorder
    }

    pub fn preload(&self) -> &PreloadScheduler {
        &self.preload
    }

    pub fn summary(&self) -> &SummaryAggregator {
        &self.summary
    }

    pub fn persistence(&self) -> &PersistenceQueue {
        &self.persistence
    }

    /// Label write queued by the most recent record or delete.
    pub fn last_write(&self) -> Option<CommandId> {
        self.last_write
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    /// Open `root`: reset the catalog and the session, and start a scan.
    pub async fn open_folder(&mut self, root: &Path) -> ScanProgress {
        self.session.clear();
        self.recorder.reset();
        self.root = Some(root.to_path_buf());

        let progress = self
            .scan
            .begin_scan(self.services.index.as_ref(), root, &mut self.catalog)
            .await;
        self.refresh_preload();
        progress
    }

    /// Apply scan entries that are already queued.
    pub fn drain_scan(&mut self) -> ScanProgress {
        let progress = self.scan.drain_ready(&mut self.catalog);
        self.refresh_preload();
        progress
    }

    /// Wait for one scan event.
    pub async fn next_scan(&mut self) -> ScanProgress {
        let progress = self.scan.next(&mut self.catalog).await;
        self.refresh_preload();
        progress
    }

    /// Wait until the running scan has delivered everything.
    pub async fn finish_scan(&mut self) -> ScanProgress {
        loop {
            let progress = self.scan.next(&mut self.catalog).await;
            if !matches!(progress, ScanProgress::Scanning { .. }) {
                self.refresh_preload();
                return progress;
            }
        }
    }

    // ------------------------------------------------------------------
    // Catalog view
    // ------------------------------------------------------------------

    /// Column click on the catalog.
    pub fn select_sort(&mut self, key: CatalogSortKey) {
        self.view.select_key(key);
        self.refresh_preload();
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.view.set_direction(direction);
        self.refresh_preload();
    }

    /// Put the catalog in an exact sort order, without toggling.
    pub fn set_sort(&mut self, key: CatalogSortKey, direction: SortDirection) {
        if self.view.sort().key != key {
            self.view.select_key(key);
        }
        self.set_sort_direction(direction);
    }

    /// Catalog in the current sort order.
    pub fn sorted_videos(&mut self) -> &[VideoCatalogEntry] {
        self.view.entries(&self.catalog)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Make `path` the active video. Returns `false` if it is not in the
    /// catalog.
    pub async fn select_video(&mut self, path: &str) -> bool {
        let Some(entry) = self.catalog.get(path).cloned() else {
            tracing::warn!(path, "Cannot select a video that is not in the catalog");
            return false;
        };

        self.catalog.select(path);
        self.recorder.reset();
        self.session
            .select_video(
                entry,
                self.services.index.as_ref(),
                self.services.media.as_ref(),
                self.services.labels.as_ref(),
            )
            .await;
        self.refresh_preload();
        true
    }

    /// Playback time update; returns the frame under the playhead.
    pub fn on_time_update(&mut self, time_secs: f64) -> Option<u64> {
        self.session
            .session_mut()
            .and_then(|s| s.on_time_update(time_secs))
    }

    /// The playback surface is ready; returns a deferred seek time, once.
    pub fn on_playback_ready(&mut self) -> Option<f64> {
        self.session.session_mut().and_then(|s| s.on_playback_ready())
    }

    /// Seek time of the event at `index`.
    pub fn seek_to_event(&self, index: usize) -> Option<f64> {
        self.session.session().and_then(|s| s.seek_to_event(index))
    }

    /// Mouse wheel over the player; `direction` is the sign of the scroll.
    pub fn scroll_seek(&self, time_secs: f64, direction: f64) -> Option<f64> {
        let sensitivity = self.session.scroll_sensitivity();
        self.session
            .session()
            .and_then(|s| s.scroll_seek(time_secs, direction, sensitivity))
    }

    pub fn scroll_sensitivity(&self) -> u32 {
        self.session.scroll_sensitivity()
    }

    pub fn set_scroll_sensitivity(&mut self, frames: u32) {
        self.session.set_scroll_sensitivity(frames);
    }

    // ------------------------------------------------------------------
    // Annotation
    // ------------------------------------------------------------------

    /// Press the mark key.
    ///
    /// A finished recording bumps the catalog count and queues a full
    /// rewrite of the label file.
    pub fn toggle_mark(&mut self) -> MarkOutcome {
        let outcome = self.recorder.toggle_mark(self.session.session_mut());
        if matches!(outcome, MarkOutcome::Recorded { .. }) {
            self.last_write = self.commit_event_change(1);
        }
        outcome
    }

    /// Delete the event at `index` of the active video.
    ///
    /// Out-of-range indexes are ignored. Returns the queued label write.
    pub fn delete_event(&mut self, index: usize) -> Option<CommandId> {
        let session = self.session.session_mut()?;
        let Some(removed) = session.remove_event(index) else {
            tracing::debug!(path = %session.path(), index, "No event to delete");
            return None;
        };
        tracing::info!(
            path = %session.path(),
            index,
            start_frame = removed.start_frame,
            end_frame = removed.end_frame,
            "Event deleted"
        );
        self.last_write = self.commit_event_change(-1);
        self.last_write
    }

    fn commit_event_change(&mut self, delta: i64) -> Option<CommandId> {
        let session = self.session.session_mut()?;
        let path = session.path().to_string();
        if let Some(count) = self.catalog.adjust_event_count(&path, delta) {
            session.entry.event_count = count;
        }

        let file = session.label_file();
        let command = match self.persistence.submit(&path, &file) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to queue label write");
                None
            }
        };
        self.refresh_preload();
        command
    }

    // ------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------

    /// Fetch a fresh summary for `root`.
    pub async fn load_summary(&mut self, root: &Path) -> bool {
        self.summary
            .load(self.services.summary.as_ref(), root)
            .await
    }

    pub fn select_summary_sort(&mut self, key: SummarySortKey) {
        self.summary.select_key(key);
    }

    pub fn set_summary_direction(&mut self, direction: SortDirection) {
        self.summary.set_direction(direction);
    }

    /// Summary rows in the current sort order.
    pub fn summary_rows(&self) -> Vec<&GlobalEvent> {
        self.summary.rows()
    }

    /// Open the video a summary row belongs to and seek to the event once
    /// playback is ready.
    pub async fn jump_to_event(&mut self, row: &GlobalEvent) -> bool {
        let Some(path) = self
            .catalog
            .find_by_name(&row.video_name)
            .map(|e| e.path.clone())
        else {
            tracing::warn!(video = %row.video_name, "Summary row has no catalog entry");
            return false;
        };

        if !self.select_video(&path).await {
            return false;
        }
        if let Some(session) = self.session.session_mut() {
            session.request_seek(row.start_frame);
        }
        true
    }

    // ------------------------------------------------------------------
    // Preload and background work
    // ------------------------------------------------------------------

    fn refresh_preload(&mut self) {
        let selected = self.catalog.selected_path().map(str::to_string);
        let view = self.view.entries(&self.catalog);
        self.preload.recompute(view, selected.as_deref());
    }

    /// Buffer callback from a preloading player.
    pub fn on_preload_progress(&mut self, generation: u64, path: &str, buffered_end: f64, total: f64) {
        self.preload
            .on_buffer_progress(generation, path, buffered_end, total);
    }

    /// Ready callback from a preloading player.
    pub fn on_preload_ready(&mut self, generation: u64, path: &str) {
        self.preload.on_ready(generation, path);
    }

    /// Pick up finished background work without waiting.
    pub fn poll_background(&mut self) {
        self.preload.poll();
        self.persistence.poll();
    }

    /// Wait for queued label writes and the current preload generation.
    pub async fn flush(&mut self) {
        self.persistence.flush().await;
        self.preload.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::PersistStatus;
    use crate::services::fakes::{FakeIndex, FakeLabels, FakeMedia, FakeSummary};
    use crate::services::ScanEvent;
    use crate::types::{LabelEvent, LabelFile, SummaryReport};
    use std::sync::Arc;

    struct Harness {
        index: Arc<FakeIndex>,
        labels: Arc<FakeLabels>,
        summary: Arc<FakeSummary>,
        bench: Workbench,
    }

    fn harness(index: FakeIndex) -> Harness {
        let index = Arc::new(index);
        let labels = Arc::new(FakeLabels::default());
        let summary = Arc::new(FakeSummary::default());
        let services = Services {
            index: index.clone(),
            media: Arc::new(FakeMedia),
            labels: labels.clone(),
            summary: summary.clone(),
        };
        Harness {
            index,
            labels,
            summary,
            bench: Workbench::new(services, WorkbenchOptions::default()),
        }
    }

    fn entry(path: &str, event_count: usize) -> VideoCatalogEntry {
        VideoCatalogEntry {
            path: path.to_string(),
            event_count,
            duration_sec: 20.0,
            last_modified: 0,
        }
    }

    async fn scan(h: &mut Harness, entries: Vec<VideoCatalogEntry>) {
        h.bench.open_folder(Path::new("/v")).await;
        let n = h.index.senders.lock().unwrap().len() - 1;
        let tx = h.index.sender(n);
        for e in entries {
            tx.send(ScanEvent::EntryDiscovered(e)).await.unwrap();
        }
        tx.send(ScanEvent::ScanComplete).await.unwrap();
        drop(tx);
        assert!(matches!(
            h.bench.finish_scan().await,
            ScanProgress::Complete { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_only_event_persists_empty_list() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        let stored = LabelFile::new(
            "/v/a.mp4",
            30.0,
            &[LabelEvent::from_marks("accident", 100, 130, 30.0).unwrap()],
        );
        h.labels.put("/v/a.mp4", &stored.to_pretty_json().unwrap());
        scan(&mut h, vec![entry("/v/a.mp4", 1)]).await;

        assert!(h.bench.select_video("/v/a.mp4").await);
        assert_eq!(h.bench.session().unwrap().events().len(), 1);

        let id = h.bench.delete_event(0).unwrap();
        h.bench.flush().await;

        assert_eq!(h.bench.persistence().status(id), Some(&PersistStatus::Committed));
        assert_eq!(h.bench.catalog().get("/v/a.mp4").unwrap().event_count, 0);
        assert!(h.labels.file("/v/a.mp4").unwrap().contains("\"events\": []"));
    }

    #[tokio::test]
    async fn test_recorded_event_matches_catalog_count() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        h.bench.select_video("/v/a.mp4").await;

        h.bench.on_time_update(200.0 / 30.0);
        assert!(matches!(h.bench.toggle_mark(), MarkOutcome::Started { start_frame: 200 }));
        h.bench.on_time_update(230.0 / 30.0);
        let MarkOutcome::Recorded { event, .. } = h.bench.toggle_mark() else {
            panic!("expected a recorded event");
        };
        assert_eq!(event.before_start_frame, 50);
        h.bench.flush().await;

        let saved = LabelFile::parse("/v/a.mp4", &h.labels.file("/v/a.mp4").unwrap()).unwrap();
        assert_eq!(saved.video_name, "a.mp4");
        assert_eq!(saved.events, vec![event]);
        assert_eq!(
            h.bench.catalog().get("/v/a.mp4").unwrap().event_count,
            saved.events.len()
        );
        assert_eq!(h.bench.session().unwrap().entry.event_count, 1);
    }

    #[tokio::test]
    async fn test_marking_keeps_events_from_bare_label_file() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        h.labels.put(
            "/v/a.mp4",
            r#"{"events":[{"label":"crash","start_frame":30,"end_frame":60,"before_start_frame":0}]}"#,
        );
        scan(&mut h, vec![entry("/v/a.mp4", 1)]).await;

        assert!(h.bench.select_video("/v/a.mp4").await);
        assert_eq!(h.bench.session().unwrap().events().len(), 1);

        h.bench.on_time_update(10.0);
        h.bench.toggle_mark();
        h.bench.on_time_update(11.0);
        assert!(matches!(
            h.bench.toggle_mark(),
            MarkOutcome::Recorded { index: 1, .. }
        ));
        h.bench.flush().await;

        let saved = LabelFile::parse("/v/a.mp4", &h.labels.file("/v/a.mp4").unwrap()).unwrap();
        assert_eq!(saved.events.len(), 2);
        assert_eq!(saved.events[0].label, "crash");
        assert_eq!(
            h.bench.catalog().get("/v/a.mp4").unwrap().event_count,
            saved.events.len()
        );
    }

    #[tokio::test]
    async fn test_marking_without_frame_rate_is_ignored() {
        let mut h = harness(FakeIndex::default());
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        h.bench.select_video("/v/a.mp4").await;

        h.bench.on_time_update(3.0);
        assert_eq!(h.bench.toggle_mark(), MarkOutcome::Ignored);
        assert_eq!(h.bench.last_write(), None);
    }

    #[tokio::test]
    async fn test_delete_out_of_range_is_a_noop() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        h.bench.select_video("/v/a.mp4").await;

        assert_eq!(h.bench.delete_event(3), None);
        h.bench.flush().await;
        assert_eq!(*h.labels.writes.lock().unwrap(), 0);
        assert_eq!(h.bench.catalog().get("/v/a.mp4").unwrap().event_count, 0);
    }

    #[tokio::test]
    async fn test_jump_to_event_defers_seek_until_ready() {
        let mut h = harness(FakeIndex::default().with_fps("/v/b.mp4", 30.0, 20.0));
        scan(&mut h, vec![entry("/v/a.mp4", 0), entry("/v/b.mp4", 1)]).await;

        let row = GlobalEvent {
            video_name: "b.mp4".to_string(),
            label: "accident".to_string(),
            start_frame: 90,
            end_frame: 120,
            fps: 30.0,
        };
        *h.summary.report.lock().unwrap() = Some(SummaryReport {
            total_videos: 2,
            total_labeled_videos: 1,
            total_events: 1,
            events: vec![row.clone()],
        });
        assert!(h.bench.load_summary(Path::new("/v")).await);
        assert_eq!(h.bench.summary_rows(), vec![&row]);

        assert!(h.bench.jump_to_event(&row).await);
        assert_eq!(h.bench.catalog().selected_path(), Some("/v/b.mp4"));
        assert_eq!(h.bench.on_playback_ready(), Some(3.0));
        assert_eq!(h.bench.on_playback_ready(), None);
    }

    #[tokio::test]
    async fn test_jump_to_unknown_video_fails() {
        let mut h = harness(FakeIndex::default());
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        let row = GlobalEvent {
            video_name: "zz.mp4".to_string(),
            label: "accident".to_string(),
            start_frame: 0,
            end_frame: 1,
            fps: 30.0,
        };
        assert!(!h.bench.jump_to_event(&row).await);
        assert!(h.bench.session().is_none());
    }

    #[tokio::test]
    async fn test_preload_follows_selection_and_labels() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        scan(
            &mut h,
            vec![
                entry("/v/a.mp4", 0),
                entry("/v/b.mp4", 0),
                entry("/v/c.mp4", 2),
                entry("/v/d.mp4", 0),
                entry("/v/e.mp4", 0),
            ],
        )
        .await;

        h.bench.select_video("/v/a.mp4").await;
        assert_eq!(h.bench.preload().candidates(), ["/v/b.mp4", "/v/d.mp4"]);
        h.bench.flush().await;
        assert_eq!(h.bench.preload().slots().len(), 2);

        h.bench.select_sort(CatalogSortKey::Name);
        assert_eq!(h.bench.sorted_videos()[0].path, "/v/e.mp4");
        assert!(h.bench.preload().candidates().is_empty());

        h.bench.set_sort(CatalogSortKey::Name, SortDirection::Ascending);
        assert_eq!(h.bench.sorted_videos()[0].path, "/v/a.mp4");
        h.bench.set_sort(CatalogSortKey::Name, SortDirection::Ascending);
        assert_eq!(h.bench.sorted_videos()[0].path, "/v/a.mp4");
    }

    #[tokio::test]
    async fn test_reopening_folder_clears_session() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        h.bench.select_video("/v/a.mp4").await;
        assert!(h.bench.session().is_some());

        scan(&mut h, vec![entry("/v/b.mp4", 0)]).await;
        assert!(h.bench.session().is_none());
        assert_eq!(h.bench.catalog().len(), 1);
        assert_eq!(h.bench.root(), Some(Path::new("/v")));
    }

    #[tokio::test]
    async fn test_scroll_sensitivity_is_clamped() {
        let mut h = harness(FakeIndex::default().with_fps("/v/a.mp4", 30.0, 20.0));
        scan(&mut h, vec![entry("/v/a.mp4", 0)]).await;
        h.bench.select_video("/v/a.mp4").await;

        h.bench.set_scroll_sensitivity(90);
        assert_eq!(h.bench.scroll_sensitivity(), 30);
        assert_eq!(h.bench.scroll_seek(5.0, 1.0), Some(6.0));
        assert_eq!(h.bench.scroll_seek(0.5, -1.0), Some(0.0));
    }
}
