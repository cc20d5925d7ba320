//! Cross-folder summary with its own sortable view.

use std::path::Path;
use std::str::FromStr;

use crate::services::SummaryService;
use crate::sort::{SortDirection, SortState};
use crate::types::{GlobalEvent, SummaryReport};

/// Summary sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySortKey {
    VideoName,
    Label,
    StartFrame,
    /// `end_frame - start_frame`
    Duration,
}

impl FromStr for SummarySortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" | "video_name" => Ok(SummarySortKey::VideoName),
            "label" => Ok(SummarySortKey::Label),
            "start" | "start_frame" => Ok(SummarySortKey::StartFrame),
            "duration" => Ok(SummarySortKey::Duration),
            _ => Err(format!("unknown summary sort key: {}", s)),
        }
    }
}

/// Sort summary rows. Stable; `None` keeps report order.
pub fn sort_events(
    events: &[GlobalEvent],
    sort: Option<SortState<SummarySortKey>>,
) -> Vec<&GlobalEvent> {
    let mut rows: Vec<&GlobalEvent> = events.iter().collect();
    let Some(sort) = sort else {
        return rows;
    };
    rows.sort_by(|a, b| {
        let ord = match sort.key {
            SummarySortKey::VideoName => a.video_name.cmp(&b.video_name),
            SummarySortKey::Label => a.label.cmp(&b.label),
            SummarySortKey::StartFrame => a.start_frame.cmp(&b.start_frame),
            SummarySortKey::Duration => a.duration_frames().cmp(&b.duration_frames()),
        };
        sort.direction.apply(ord)
    });
    rows
}

/// Holds the last fetched [`SummaryReport`] and its sort state.
#[derive(Debug, Default)]
pub struct SummaryAggregator {
    report: Option<SummaryReport>,
    sort: Option<SortState<SummarySortKey>>,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a fresh snapshot for `root`.
    ///
    /// On failure the previous snapshot is dropped and `false` is returned.
    pub async fn load(&mut self, service: &dyn SummaryService, root: &Path) -> bool {
        match service.get_summary(root).await {
            Ok(report) => {
                tracing::info!(
                    root = %root.display(),
                    videos = report.total_videos,
                    labeled = report.total_labeled_videos,
                    events = report.total_events,
                    "Summary loaded"
                );
                self.report = Some(report);
                true
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Failed to load summary");
                self.report = None;
                false
            }
        }
    }

    pub fn report(&self) -> Option<&SummaryReport> {
        self.report.as_ref()
    }

    pub fn sort(&self) -> Option<SortState<SummarySortKey>> {
        self.sort
    }

    /// Click on a column; same toggle rules as the catalog.
    pub fn select_key(&mut self, key: SummarySortKey) {
        match self.sort.as_mut() {
            Some(sort) => sort.select(key),
            None => self.sort = Some(SortState::new(key)),
        }
    }

    pub fn set_direction(&mut self, direction: SortDirection) {
        if let Some(sort) = self.sort.as_mut() {
            sort.direction = direction;
        }
    }

    /// Event rows in the current sort order.
    pub fn rows(&self) -> Vec<&GlobalEvent> {
        match &self.report {
            Some(report) => sort_events(&report.events, self.sort),
            None => Vec::new(),
        }
    }
}
