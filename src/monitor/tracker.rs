//! In-memory progress tracker backing [`ProgressMonitor`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, instrument};

use super::signal::{ChangeNotifier, ChangeSignal};
use super::task::{DownloadStatus, DownloadTask, MonitorSnapshot, ProgressUpdate, TaskStatusCount};
use super::Monitor;
use crate::download::DownloadRequest;

/// Thread-safe registry of download tasks with derived statistics.
///
/// All registry access goes through one reader/writer lock, held only for
/// the map update itself. Every state change posts to the change signal
/// after the lock is released.
#[derive(Debug)]
pub struct ProgressMonitor {
    registry: RwLock<Registry>,
    notifier: ChangeNotifier,
}

#[derive(Debug, Default)]
struct Registry {
    tasks: HashMap<u64, Tracked>,
    next_sequence: u64,
}

#[derive(Debug)]
struct Tracked {
    task: DownloadTask,
    /// Registration order, used to break `enqueued_at` ties.
    sequence: u64,
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            notifier: ChangeNotifier::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `apply` to a task under the write lock; posts if it reports a
    /// change. Unknown IDs are ignored.
    fn mutate(&self, id: u64, apply: impl FnOnce(&mut DownloadTask) -> bool) {
        let changed = {
            let mut registry = self.write();
            match registry.tasks.get_mut(&id) {
                Some(tracked) => apply(&mut tracked.task),
                None => {
                    debug!(id, "ignoring update for unknown task");
                    false
                }
            }
        };
        if changed {
            self.notifier.post();
        }
    }
}

impl Monitor for ProgressMonitor {
    #[instrument(level = "debug", skip(self, request), fields(id = request.id))]
    fn register(&self, request: &DownloadRequest) {
        let task = DownloadTask::pending(
            request.id,
            request.file_name_or_default().to_string(),
            request.full_path.clone().unwrap_or_default(),
            Utc::now(),
        );
        {
            let mut registry = self.write();
            let sequence = registry.next_sequence;
            registry.next_sequence += 1;
            // Duplicate IDs replace the earlier record.
            registry.tasks.insert(request.id, Tracked { task, sequence });
        }
        self.notifier.post();
    }

    fn mark_started(&self, id: u64) {
        self.mutate(id, |task| {
            if task.status != DownloadStatus::Pending {
                return false;
            }
            task.status = DownloadStatus::InProgress;
            task.start_time = Some(Utc::now());
            true
        });
    }

    fn update_progress(&self, id: u64, update: ProgressUpdate) {
        self.mutate(id, |task| {
            if task.status.is_terminal() {
                return false;
            }
            if task.status == DownloadStatus::Pending {
                task.status = DownloadStatus::InProgress;
            }
            task.start_time.get_or_insert_with(Utc::now);
            task.done_bytes = update.done_bytes;
            task.total_bytes = update.total_bytes;
            task.download_speed = update.speed;
            task.eta = update.eta;
            true
        });
    }

    fn mark_completed(&self, id: u64) {
        self.mutate(id, |task| {
            if task.status.is_terminal() {
                return false;
            }
            task.status = DownloadStatus::Completed;
            // Chunked responses never learn their total; keep the last count.
            if task.total_bytes > 0 {
                task.done_bytes = task.total_bytes;
            }
            task.completed_at = Some(Utc::now());
            true
        });
    }

    fn mark_failed(&self, id: u64, error: &str) {
        self.mutate(id, |task| {
            if task.status.is_terminal() {
                return false;
            }
            task.status = DownloadStatus::Failed;
            task.error = error.to_string();
            task.completed_at = Some(Utc::now());
            true
        });
    }

    fn snapshot(&self) -> MonitorSnapshot {
        let mut ordered: Vec<(u64, DownloadTask)> = {
            let registry = self.read();
            registry
                .tasks
                .values()
                .map(|tracked| (tracked.sequence, tracked.task.clone()))
                .collect()
        };
        ordered.sort_by(|(seq_a, a), (seq_b, b)| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| seq_a.cmp(seq_b))
        });

        let mut position = 0;
        let tasks: Vec<DownloadTask> = ordered
            .into_iter()
            .map(|(_, mut task)| {
                task.queue_position = if task.status == DownloadStatus::Pending {
                    position += 1;
                    position
                } else {
                    0
                };
                task
            })
            .collect();

        let count = TaskStatusCount::from_tasks(&tasks);
        MonitorSnapshot { tasks, count }
    }

    fn change_signal(&self) -> ChangeSignal {
        self.notifier.subscribe()
    }

    fn shutdown(&self) {
        if !self.notifier.close() {
            debug!("monitor change signal already closed");
        }
    }
}
