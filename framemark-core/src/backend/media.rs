use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::services::MediaServer;
use crate::types::PlayableHandle;

/// Maps video paths to stable ids served under `{base_url}/video/{id}`.
///
/// The HTTP server itself lives outside this crate. An embedder that runs
/// one builds the registry, hands a clone of the `Arc` to
/// [`Services::media`](crate::services::Services) and serves
/// `GET /video/{id}` through [`MediaRegistry::resolve`].
#[derive(Debug)]
pub struct MediaRegistry {
    base_url: String,
    videos: RwLock<HashMap<String, PathBuf>>,
}

impl MediaRegistry {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            videos: RwLock::new(HashMap::new()),
        }
    }

    /// Stable id of a path: first 16 hex chars of its SHA-256.
    pub fn video_id(path: &str) -> String {
        let digest = Sha256::digest(path.as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(16);
        id
    }

    /// Path registered under `id`, if any.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        self.videos.read().ok()?.get(id).cloned()
    }
}

#[async_trait]
impl MediaServer for MediaRegistry {
    async fn register_video(&self, path: &str) -> Result<PlayableHandle> {
        let id = Self::video_id(path);
        self.videos
            .write()
            .map_err(|_| Error::Media {
                path: path.to_string(),
                message: "registry lock poisoned".to_string(),
            })?
            .insert(id.clone(), PathBuf::from(path));
        Ok(PlayableHandle(format!("{}/video/{}", self.base_url, id)))
    }
}
