//! # framemark-core
//!
//! Core library for framemark - a frame-accurate event labeler for folders of
//! videos.
//!
//! This library provides:
//! - Domain types for catalog entries, label events and summaries
//! - The session and annotation engine, owned by a [`Workbench`]
//! - Collaborator traits plus local filesystem / `ffprobe` implementations
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way through the engine:
//! - **Scan ingestion** streams discovered videos into the **catalog store**
//! - The **catalog view** sorts the store; the **session controller** and the
//!   **preload scheduler** read from the view and the selection
//! - The **annotation recorder** appends events to the session; the workbench
//!   updates catalog counts and queues label writes on the **persistence queue**
//! - The **summary aggregator** reads label files across the folder and only
//!   touches the catalog when the operator jumps to an event
//!
//! ## Example
//!
//! ```rust,no_run
//! use framemark_core::{backend, Config, Workbench, WorkbenchOptions};
//! use std::path::Path;
//!
//! # async fn run() {
//! let config = Config::load().expect("failed to load config");
//! let services = backend::local_services(&config.media);
//!
//! let mut bench = Workbench::new(services, WorkbenchOptions::from(&config));
//! bench.open_folder(Path::new("/videos")).await;
//! bench.finish_scan().await;
//! for video in bench.sorted_videos() {
//!     println!("{} ({} events)", video.path, video.event_count);
//! }
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use catalog::{CatalogSortKey, CatalogStore, CatalogView};
pub use config::Config;
pub use error::{Error, Result};
pub use persist::{CommandId, PersistStatus, PersistenceQueue};
pub use recent::RecentFolder;
pub use recorder::{AnnotationRecorder, MarkOutcome, RecorderState};
pub use scan::{ScanIngestion, ScanProgress};
pub use services::{
    LabelStore, MediaServer, ScanEvent, ScanStream, Services, SummaryService, Telemetry,
    VideoIndex,
};
pub use session::{SessionController, VideoSession};
pub use sort::{SortDirection, SortState};
pub use summary::{SummaryAggregator, SummarySortKey};
pub use telemetry::StatsPoller;
pub use types::*;
pub use workbench::{Workbench, WorkbenchOptions};

// Public modules
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod persist;
pub mod preload;
pub mod recent;
pub mod recorder;
pub mod scan;
pub mod services;
pub mod session;
pub mod sort;
pub mod summary;
pub mod telemetry;
pub mod types;
pub mod workbench;
