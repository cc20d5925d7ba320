//! Error types for framemark-core

use thiserror::Error;

/// Main error type for the framemark-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The video index could not start or continue a folder scan
    #[error("scan error for {root}: {message}")]
    Scan { root: String, message: String },

    /// Frame rate / duration probing failed
    #[error("metadata error for {path}: {message}")]
    Metadata { path: String, message: String },

    /// Label file could not be written
    #[error("persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    /// Label file exists but could not be understood
    #[error("label parse error for {path}: {message}")]
    LabelParse { path: String, message: String },

    /// Summary service failure
    #[error("summary load error for {root}: {message}")]
    SummaryLoad { root: String, message: String },

    /// Media server could not hand out a playable handle
    #[error("media registration error for {path}: {message}")]
    Media { path: String, message: String },

    /// Telemetry probe failure
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// A recording ended before it started
    #[error("end frame {end_frame} precedes start frame {start_frame}")]
    ReversedEvent { start_frame: u64, end_frame: u64 },
}

/// Result type alias for framemark-core
pub type Result<T> = std::result::Result<T, Error>;
