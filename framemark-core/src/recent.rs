//! The last-opened root folder, remembered across restarts.
//!
//! This is the only piece of state framemark persists on its own. It lives
//! in `$XDG_STATE_HOME/framemark/recent.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct RecentFile {
    last_folder: Option<PathBuf>,
}

/// Reads and writes the last-opened folder.
#[derive(Debug, Clone)]
pub struct RecentFolder {
    path: PathBuf,
}

impl Default for RecentFolder {
    fn default() -> Self {
        Self::at(Config::recent_path())
    }
}

impl RecentFolder {
    /// Use a specific state file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered folder, if any.
    ///
    /// A missing or unreadable file means nothing is remembered.
    pub fn load(&self) -> Option<PathBuf> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match toml::from_str::<RecentFile>(&content) {
            Ok(file) => file.last_folder,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable recent-folder file");
                None
            }
        }
    }

    /// Remember `folder`.
    pub fn save(&self, folder: &Path) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = RecentFile {
            last_folder: Some(folder.to_path_buf()),
        };
        let content = toml::to_string(&file)
            .map_err(|e| Error::Config(format!("failed to serialize recent folder: {}", e)))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let recent = RecentFolder::at(dir.path().join("state/recent.toml"));
        assert_eq!(recent.load(), None);

        recent.save(Path::new("/videos/batch-1")).unwrap();
        assert_eq!(recent.load(), Some(PathBuf::from("/videos/batch-1")));

        recent.save(Path::new("/videos/batch-2")).unwrap();
        assert_eq!(recent.load(), Some(PathBuf::from("/videos/batch-2")));
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recent.toml");
        std::fs::write(&path, "last_folder = [").unwrap();
        assert_eq!(RecentFolder::at(path).load(), None);
    }
}
