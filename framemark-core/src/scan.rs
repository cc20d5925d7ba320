//! Scan ingestion
//!
//! Turns the video index's `entry-discovered` / `scan-complete` stream into
//! catalog mutations.
//!
//! ## Generations
//!
//! Each call to [`ScanIngestion::begin_scan`] opens a new generation. The
//! previous [`ScanSubscription`] is dropped *before* the index is asked for a
//! new stream, so no entry from an older folder can land in the fresh
//! catalog. The subscription is also dropped as soon as `scan-complete`
//! arrives or the producer disconnects.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::error::TryRecvError;

use crate::catalog::CatalogStore;
use crate::services::{ScanEvent, ScanStream, VideoIndex};

/// Owned handle on one in-flight scan. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ScanSubscription {
    generation: u64,
    root: PathBuf,
    stream: ScanStream,
    received: usize,
}

impl ScanSubscription {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Progress report after feeding scan events into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    /// No scan is running
    Idle,
    /// Still scanning; `entries` discovered so far in this generation
    Scanning { entries: usize },
    /// The scan finished and its subscription was released
    Complete { entries: usize },
}

/// Drives scan subscriptions into a [`CatalogStore`].
#[derive(Debug, Default)]
pub struct ScanIngestion {
    active: Option<ScanSubscription>,
    generation: u64,
}

impl ScanIngestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a scan is still delivering entries.
    pub fn is_scanning(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the most recent scan request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start scanning `root`, replacing any scan in flight.
    ///
    /// The catalog is reset even if the index refuses the request; the
    /// failure is logged and the catalog stays empty.
    pub async fn begin_scan(
        &mut self,
        index: &dyn VideoIndex,
        root: &Path,
        catalog: &mut CatalogStore,
    ) -> ScanProgress {
        if let Some(old) = self.active.take() {
            tracing::debug!(
                generation = old.generation,
                received = old.received,
                root = %old.root.display(),
                "Releasing superseded scan"
            );
        }

        catalog.reset();
        self.generation += 1;

        match index.begin_scan(root).await {
            Ok(stream) => {
                tracing::info!(
                    generation = self.generation,
                    root = %root.display(),
                    "Scan started"
                );
                self.active = Some(ScanSubscription {
                    generation: self.generation,
                    root: root.to_path_buf(),
                    stream,
                    received: 0,
                });
                ScanProgress::Scanning { entries: 0 }
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Failed to start scan");
                ScanProgress::Idle
            }
        }
    }

    /// Apply every event that is already queued, without waiting.
    pub fn drain_ready(&mut self, catalog: &mut CatalogStore) -> ScanProgress {
        loop {
            let Some(sub) = self.active.as_mut() else {
                return ScanProgress::Idle;
            };
            match sub.stream.try_recv() {
                Ok(event) => {
                    if let Some(done) = self.apply(event, catalog) {
                        return done;
                    }
                }
                Err(TryRecvError::Empty) => {
                    return ScanProgress::Scanning {
                        entries: sub.received,
                    }
                }
                Err(TryRecvError::Disconnected) => return self.disconnected(),
            }
        }
    }

    /// Wait for the next event and apply it.
    pub async fn next(&mut self, catalog: &mut CatalogStore) -> ScanProgress {
        let Some(sub) = self.active.as_mut() else {
            return ScanProgress::Idle;
        };
        let Some(event) = sub.stream.recv().await else {
            return self.disconnected();
        };
        match self.apply(event, catalog) {
            Some(done) => done,
            None => ScanProgress::Scanning {
                entries: self.active.as_ref().map_or(0, |s| s.received),
            },
        }
    }

    /// Apply one event; returns `Some` once the scan is finished.
    fn apply(&mut self, event: ScanEvent, catalog: &mut CatalogStore) -> Option<ScanProgress> {
        let sub = self.active.as_mut()?;
        match event {
            ScanEvent::EntryDiscovered(entry) => {
                tracing::trace!(generation = sub.generation, path = %entry.path, "Video discovered");
                sub.received += 1;
                catalog.append(entry);
                None
            }
            ScanEvent::ScanComplete => {
                let entries = sub.received;
                tracing::info!(
                    generation = sub.generation,
                    entries,
                    root = %sub.root.display(),
                    "Scan complete"
                );
                self.active = None;
                Some(ScanProgress::Complete { entries })
            }
        }
    }

    /// The producer went away without sending `scan-complete`.
    fn disconnected(&mut self) -> ScanProgress {
        let entries = self.active.as_ref().map_or(0, |s| s.received);
        if let Some(sub) = self.active.take() {
            tracing::warn!(
                generation = sub.generation,
                entries,
                "Scan stream closed before completion"
            );
        }
        ScanProgress::Complete { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::FakeIndex;
    use crate::types::VideoCatalogEntry;

    fn entry(path: &str) -> VideoCatalogEntry {
        VideoCatalogEntry {
            path: path.to_string(),
            event_count: 0,
            duration_sec: 1.0,
            last_modified: 0,
        }
    }

    #[tokio::test]
    async fn test_scan_populates_catalog_in_arrival_order() {
        let index = FakeIndex::default();
        let mut catalog = CatalogStore::new();
        let mut scan = ScanIngestion::new();

        scan.begin_scan(&index, Path::new("/v"), &mut catalog).await;
        let tx = index.sender(0);
        tx.send(ScanEvent::EntryDiscovered(entry("/v/b.mp4"))).await.unwrap();
        tx.send(ScanEvent::EntryDiscovered(entry("/v/a.mp4"))).await.unwrap();

        assert_eq!(
            scan.drain_ready(&mut catalog),
            ScanProgress::Scanning { entries: 2 }
        );
        tx.send(ScanEvent::ScanComplete).await.unwrap();
        assert_eq!(
            scan.next(&mut catalog).await,
            ScanProgress::Complete { entries: 2 }
        );

        assert!(!scan.is_scanning());
        let paths: Vec<_> = catalog.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/v/b.mp4", "/v/a.mp4"]);
    }

    #[tokio::test]
    async fn test_restart_discards_previous_generation() {
        let index = FakeIndex::default();
        let mut catalog = CatalogStore::new();
        let mut scan = ScanIngestion::new();

        scan.begin_scan(&index, Path::new("/old"), &mut catalog).await;
        let old_tx = index.sender(0);
        old_tx
            .send(ScanEvent::EntryDiscovered(entry("/old/1.mp4")))
            .await
            .unwrap();
        scan.drain_ready(&mut catalog);
        assert_eq!(catalog.len(), 1);

        scan.begin_scan(&index, Path::new("/new"), &mut catalog).await;
        assert_eq!(scan.generation(), 2);
        assert!(catalog.is_empty());

        // The old producer finds its receiver gone
        assert!(old_tx
            .send(ScanEvent::EntryDiscovered(entry("/old/2.mp4")))
            .await
            .is_err());

        let new_tx = index.sender(1);
        new_tx
            .send(ScanEvent::EntryDiscovered(entry("/new/1.mp4")))
            .await
            .unwrap();
        new_tx.send(ScanEvent::ScanComplete).await.unwrap();
        assert_eq!(
            scan.drain_ready(&mut catalog),
            ScanProgress::Complete { entries: 1 }
        );

        let paths: Vec<_> = catalog.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/new/1.mp4"]);
    }

    #[tokio::test]
    async fn test_complete_releases_subscription() {
        let index = FakeIndex::default();
        let mut catalog = CatalogStore::new();
        let mut scan = ScanIngestion::new();

        scan.begin_scan(&index, Path::new("/v"), &mut catalog).await;
        let tx = index.sender(0);
        tx.send(ScanEvent::ScanComplete).await.unwrap();
        scan.drain_ready(&mut catalog);

        assert!(tx
            .send(ScanEvent::EntryDiscovered(entry("/v/late.mp4")))
            .await
            .is_err());
        assert_eq!(scan.drain_ready(&mut catalog), ScanProgress::Idle);
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_failed_scan_leaves_empty_catalog() {
        let index = FakeIndex::default();
        *index.fail_scan.lock().unwrap() = true;
        let mut catalog = CatalogStore::new();
        catalog.append(entry("/stale.mp4"));
        let mut scan = ScanIngestion::new();

        let progress = scan.begin_scan(&index, Path::new("/v"), &mut catalog).await;
        assert_eq!(progress, ScanProgress::Idle);
        assert!(catalog.is_empty());
        assert!(!scan.is_scanning());
    }

    #[tokio::test]
    async fn test_producer_disconnect_ends_scan() {
        let index = FakeIndex::default();
        let mut catalog = CatalogStore::new();
        let mut scan = ScanIngestion::new();

        scan.begin_scan(&index, Path::new("/v"), &mut catalog).await;
        {
            let tx = index.sender(0);
            tx.send(ScanEvent::EntryDiscovered(entry("/v/a.mp4"))).await.unwrap();
        }
        index.senders.lock().unwrap().clear();

        assert_eq!(
            scan.drain_ready(&mut catalog),
            ScanProgress::Complete { entries: 1 }
        );
        assert!(!scan.is_scanning());
    }
}
