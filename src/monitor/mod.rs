//! Live progress tracking for download jobs.
//!
//! The engine reports every lifecycle step to a [`Monitor`]. Two
//! implementations ship with the crate:
//! - [`ProgressMonitor`] - in-memory task registry with derived counts,
//!   FIFO queue positions and a coalescing [`ChangeSignal`]
//! - [`NoopMonitor`] - keeps nothing and never signals; the engine default
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dlfetch::{Fetcher, FetcherConfig, Monitor, ProgressMonitor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = Arc::new(ProgressMonitor::new());
//! let fetcher = Fetcher::new(FetcherConfig::default().with_monitor(monitor.clone()))?;
//! let mut signal = monitor.change_signal();
//! fetcher.start()?;
//!
//! while signal.changed().await {
//!     let snapshot = monitor.snapshot();
//!     if snapshot.count.all_finished() {
//!         break;
//!     }
//! }
//! fetcher.stop().await;
//! # Ok(())
//! # }
//! ```

mod signal;
mod task;
mod tracker;

pub use signal::ChangeSignal;
pub use task::{DownloadStatus, DownloadTask, MonitorSnapshot, ProgressUpdate, TaskStatusCount};
pub use tracker::ProgressMonitor;

use std::fmt;

use crate::download::DownloadRequest;
use signal::ChangeNotifier;

/// Receives lifecycle and progress events for download jobs.
///
/// Implementations must be cheap and non-blocking: every method is called
/// from worker tasks while a transfer is running. Unknown IDs are ignored.
pub trait Monitor: Send + Sync + fmt::Debug {
    /// Starts tracking a request as `pending`.
    fn register(&self, request: &DownloadRequest);

    /// Moves a pending task to `in_progress`.
    fn mark_started(&self, id: u64);

    /// Records bytes transferred, speed and ETA.
    fn update_progress(&self, id: u64, update: ProgressUpdate);

    /// Moves a task to `completed`.
    fn mark_completed(&self, id: u64);

    /// Moves a task to `failed` with a message.
    fn mark_failed(&self, id: u64, error: &str);

    /// Returns a consistent view of every tracked task.
    fn snapshot(&self) -> MonitorSnapshot;

    /// Returns a handle that reports when anything changed.
    fn change_signal(&self) -> ChangeSignal;

    /// Closes the change signal. Safe to call more than once.
    fn shutdown(&self);
}

/// Monitor that tracks nothing.
///
/// Its snapshot is always empty and its change signal is closed from the
/// start, so observers never wait on it.
#[derive(Debug)]
pub struct NoopMonitor {
    notifier: ChangeNotifier,
}

impl Default for NoopMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NoopMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            notifier: ChangeNotifier::closed(),
        }
    }
}

impl Monitor for NoopMonitor {
    fn register(&self, _request: &DownloadRequest) {}

    fn mark_started(&self, _id: u64) {}

    fn update_progress(&self, _id: u64, _update: ProgressUpdate) {}

    fn mark_completed(&self, _id: u64) {}

    fn mark_failed(&self, _id: u64, _error: &str) {}

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot::default()
    }

    fn change_signal(&self) -> ChangeSignal {
        self.notifier.subscribe()
    }

    fn shutdown(&self) {}
}
