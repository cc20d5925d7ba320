//! Background label persistence
//!
//! Every change to a session's event list is written as a full rewrite of
//! the label file. Writes are fire-and-forget from the caller's point of
//! view, but each one is tracked as a [`PersistCommand`] so the pending
//! window and failures stay observable.
//!
//! A single writer task drains the queue in submission order, which keeps
//! writes for the same video in the order they were issued. Failures are
//! logged and recorded; nothing is retried.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::services::LabelStore;
use crate::types::LabelFile;

/// Identifier of a submitted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u64);

/// Lifecycle of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
    /// Submitted, not yet acknowledged by the store
    Pending,
    /// The store accepted the write
    Committed,
    /// The store rejected the write; it will not be retried
    Failed(String),
}

/// One tracked label write.
#[derive(Debug, Clone)]
pub struct PersistCommand {
    pub id: CommandId,
    pub video_path: String,
    pub event_count: usize,
    pub status: PersistStatus,
}

struct Job {
    id: CommandId,
    video_path: String,
    json: String,
}

struct Outcome {
    id: CommandId,
    result: std::result::Result<(), String>,
}

/// Write statistics
#[derive(Debug, Default, Clone)]
pub struct PersistStats {
    pub submitted: usize,
    pub committed: usize,
    pub failed: usize,
}

/// FIFO queue of label writes with a single background writer.
pub struct PersistenceQueue {
    jobs: mpsc::UnboundedSender<Job>,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    commands: BTreeMap<CommandId, PersistCommand>,
    next_id: u64,
    stats: PersistStats,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for PersistenceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceQueue")
            .field("pending", &self.pending_count())
            .field("stats", &self.stats)
            .finish()
    }
}

impl PersistenceQueue {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn LabelStore>) -> Self {
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                let result = store
                    .save_labels(&job.video_path, &job.json)
                    .await
                    .map_err(|e| e.to_string());
                if outcome_tx.send(Outcome { id: job.id, result }).is_err() {
                    break;
                }
            }
        });

        Self {
            jobs,
            outcomes,
            commands: BTreeMap::new(),
            next_id: 0,
            stats: PersistStats::default(),
            worker,
        }
    }

    /// Queue a full rewrite of a label file.
    ///
    /// Serialization happens here so the queued payload is a snapshot of the
    /// list at submission time.
    pub fn submit(&mut self, video_path: &str, file: &LabelFile) -> Result<CommandId> {
        let json = file.to_pretty_json()?;
        let id = CommandId(self.next_id);
        self.next_id += 1;

        self.commands.insert(
            id,
            PersistCommand {
                id,
                video_path: video_path.to_string(),
                event_count: file.events.len(),
                status: PersistStatus::Pending,
            },
        );
        self.stats.submitted += 1;

        let job = Job {
            id,
            video_path: video_path.to_string(),
            json,
        };
        if self.jobs.send(job).is_err() {
            self.settle(Outcome {
                id,
                result: Err("label writer stopped".to_string()),
            });
        } else {
            tracing::debug!(path = %video_path, events = file.events.len(), "Label write queued");
        }
        Ok(id)
    }

    /// Record outcomes that have already arrived.
    pub fn poll(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.settle(outcome);
            settled += 1;
        }
        settled
    }

    /// Wait until every submitted write has settled.
    pub async fn flush(&mut self) {
        self.poll();
        while self.pending_count() > 0 {
            match self.outcomes.recv().await {
                Some(outcome) => self.settle(outcome),
                None => break,
            }
        }
    }

    fn settle(&mut self, outcome: Outcome) {
        let Some(command) = self.commands.get_mut(&outcome.id) else {
            return;
        };
        match outcome.result {
            Ok(()) => {
                self.stats.committed += 1;
                command.status = PersistStatus::Committed;
                tracing::debug!(path = %command.video_path, "Label write committed");
            }
            Err(message) => {
                self.stats.failed += 1;
                tracing::warn!(
                    path = %command.video_path,
                    error = %message,
                    "Label write failed"
                );
                command.status = PersistStatus::Failed(message);
            }
        }
    }

    pub fn status(&self, id: CommandId) -> Option<&PersistStatus> {
        self.commands.get(&id).map(|c| &c.status)
    }

    pub fn command(&self, id: CommandId) -> Option<&PersistCommand> {
        self.commands.get(&id)
    }

    /// Commands that have not settled yet.
    pub fn pending_count(&self) -> usize {
        self.commands
            .values()
            .filter(|c| c.status == PersistStatus::Pending)
            .count()
    }

    /// Commands that failed, oldest first.
    pub fn failures(&self) -> impl Iterator<Item = &PersistCommand> {
        self.commands
            .values()
            .filter(|c| matches!(c.status, PersistStatus::Failed(_)))
    }

    pub fn stats(&self) -> &PersistStats {
        &self.stats
    }
}

impl Drop for PersistenceQueue {
    fn drop(&mut self) {
        if self.pending_count() > 0 {
            tracing::warn!(
                pending = self.pending_count(),
                "Dropping persistence queue with unsettled writes"
            );
        }
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::FakeLabels;
    use crate::types::LabelEvent;

    fn file(events: usize) -> LabelFile {
        let events: Vec<_> = (0..events as u64)
            .map(|i| LabelEvent::from_marks("accident", i * 10, i * 10 + 5, 30.0).unwrap())
            .collect();
        LabelFile::new("/v/clip.mp4", 30.0, &events)
    }

    #[tokio::test]
    async fn test_submit_is_pending_until_settled() {
        let labels = Arc::new(FakeLabels::default());
        let mut queue = PersistenceQueue::spawn(labels.clone());

        let id = queue.submit("/v/clip.mp4", &file(1)).unwrap();
        assert_eq!(queue.status(id), Some(&PersistStatus::Pending));
        assert_eq!(queue.pending_count(), 1);

        queue.flush().await;
        assert_eq!(queue.status(id), Some(&PersistStatus::Committed));
        assert_eq!(queue.pending_count(), 0);
        assert!(labels.file("/v/clip.mp4").unwrap().contains("\"accident\""));
    }

    #[tokio::test]
    async fn test_failure_is_visible_and_not_retried() {
        let labels = Arc::new(FakeLabels::default());
        *labels.fail_writes.lock().unwrap() = true;
        let mut queue = PersistenceQueue::spawn(labels.clone());

        let id = queue.submit("/v/clip.mp4", &file(2)).unwrap();
        queue.flush().await;

        assert!(matches!(queue.status(id), Some(PersistStatus::Failed(_))));
        assert_eq!(queue.failures().count(), 1);
        assert_eq!(queue.stats().failed, 1);
        assert_eq!(*labels.writes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_writes_for_same_path_apply_in_order() {
        let labels = Arc::new(FakeLabels::default());
        let mut queue = PersistenceQueue::spawn(labels.clone());

        queue.submit("/v/clip.mp4", &file(1)).unwrap();
        queue.submit("/v/clip.mp4", &file(3)).unwrap();
        let last = queue.submit("/v/clip.mp4", &file(0)).unwrap();
        queue.flush().await;

        assert_eq!(queue.command(last).unwrap().event_count, 0);
        let stored = LabelFile::parse("clip", &labels.file("/v/clip.mp4").unwrap()).unwrap();
        assert!(stored.events.is_empty());
        assert_eq!(queue.stats().committed, 3);
    }
}
