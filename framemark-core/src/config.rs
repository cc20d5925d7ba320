//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/framemark/config.toml`
//!
//! Paths follow the XDG base directory layout:
//! - Config: `$XDG_CONFIG_HOME/framemark/` (~/.config/framemark/)
//! - State/Logs: `$XDG_STATE_HOME/framemark/` (~/.local/state/framemark/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest accepted scroll sensitivity, in frames per wheel tick.
pub const MIN_SCROLL_SENSITIVITY: u32 = 1;

/// Highest accepted scroll sensitivity, in frames per wheel tick.
pub const MAX_SCROLL_SENSITIVITY: u32 = 30;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Annotation defaults
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Local media server settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Resource usage polling
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Editor session defaults
    #[serde(default)]
    pub session: SessionConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Annotation defaults
#[derive(Debug, Deserialize)]
pub struct LabelsConfig {
    /// Label given to every newly recorded event
    #[serde(default = "default_label")]
    pub default_label: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            default_label: default_label(),
        }
    }
}

fn default_label() -> String {
    "accident".to_string()
}

/// Local media server settings
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Base URL the playable handles point at
    #[serde(default = "default_media_base_url")]
    pub base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: default_media_base_url(),
        }
    }
}

fn default_media_base_url() -> String {
    "http://127.0.0.1:3030".to_string()
}

/// Resource usage polling
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Milliseconds between samples
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TelemetryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// Editor session defaults. Changes made while running are not saved.
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Frames moved per mouse wheel tick (1-30)
    #[serde(default = "default_scroll_sensitivity")]
    pub scroll_sensitivity: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scroll_sensitivity: default_scroll_sensitivity(),
        }
    }
}

fn default_scroll_sensitivity() -> u32 {
    MIN_SCROLL_SENSITIVITY
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let sensitivity = self.session.scroll_sensitivity;
        if !(MIN_SCROLL_SENSITIVITY..=MAX_SCROLL_SENSITIVITY).contains(&sensitivity) {
            return Err(Error::Config(format!(
                "session.scroll_sensitivity must be between {} and {}",
                MIN_SCROLL_SENSITIVITY, MAX_SCROLL_SENSITIVITY
            )));
        }
        if self.telemetry.poll_interval_ms == 0 {
            return Err(Error::Config(
                "telemetry.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.labels.default_label.trim().is_empty() {
            return Err(Error::Config(
                "labels.default_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/framemark/config.toml` (~/.config/framemark/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("framemark").join("config.toml")
    }

    /// Returns the state directory path (for logs and the last-opened folder)
    ///
    /// `$XDG_STATE_HOME/framemark/` (~/.local/state/framemark/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("framemark")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/framemark/framemark.log` (~/.local/state/framemark/framemark.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("framemark.log")
    }

    /// Returns the file remembering the last-opened folder
    ///
    /// `$XDG_STATE_HOME/framemark/recent.toml`
    pub fn recent_path() -> PathBuf {
        Self::state_dir().join("recent.toml")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
