//! Task records and snapshot types exposed by the monitor.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::download::UNKNOWN_SIZE;

/// Lifecycle state of a tracked download.
///
/// `Pending → InProgress → {Completed, Failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting in the queue.
    Pending,
    /// Picked up by a worker.
    InProgress,
    /// Committed to its final path.
    Completed,
    /// Ended with an error.
    Failed,
}

impl DownloadStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

/// Live record of one job, as owned by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub id: u64,
    pub file_name: String,
    #[serde(skip)]
    pub file_path: PathBuf,
    /// Expected size, or `-1` when the server didn't say.
    pub total_bytes: i64,
    pub done_bytes: i64,
    pub status: DownloadStatus,
    /// Failure message; empty unless `status` is `Failed`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Throughput in MB/s, one decimal.
    pub download_speed: f64,
    pub eta: String,
    /// 1-based FIFO rank among pending tasks; 0 otherwise.
    pub queue_position: usize,
    pub enqueued_at: DateTime<Utc>,
}

impl DownloadTask {
    pub(crate) fn pending(
        id: u64,
        file_name: String,
        file_path: PathBuf,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            file_name,
            file_path,
            total_bytes: UNKNOWN_SIZE,
            done_bytes: 0,
            status: DownloadStatus::Pending,
            error: String::new(),
            start_time: None,
            completed_at: None,
            download_speed: 0.0,
            eta: String::new(),
            queue_position: 0,
            enqueued_at,
        }
    }
}

/// One progress observation for an in-flight transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub done_bytes: i64,
    /// Expected size, or `-1` when unknown.
    pub total_bytes: i64,
    /// MB/s, one decimal.
    pub speed: f64,
    pub eta: String,
}

/// Per-status counts, derived from the task list at snapshot time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusCount {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskStatusCount {
    pub(crate) fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a DownloadTask>) -> Self {
        let mut count = Self::default();
        for task in tasks {
            count.total += 1;
            match task.status {
                DownloadStatus::Pending => count.pending += 1,
                DownloadStatus::InProgress => count.in_progress += 1,
                DownloadStatus::Completed => count.completed += 1,
                DownloadStatus::Failed => count.failed += 1,
            }
        }
        count
    }

    /// Returns true once every known task reached a terminal state.
    #[must_use]
    pub fn all_finished(&self) -> bool {
        self.total > 0 && self.completed + self.failed == self.total
    }
}

/// Point-in-time view of every tracked task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub tasks: Vec<DownloadTask>,
    pub count: TaskStatusCount,
}

impl MonitorSnapshot {
    /// Finds a task by ID.
    #[must_use]
    pub fn task(&self, id: u64) -> Option<&DownloadTask> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            DownloadStatus::Pending,
            DownloadStatus::InProgress,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DownloadStatus>().unwrap(), status);
        }
        assert!("paused".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn test_status_terminal_flags() {
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::InProgress.is_terminal());
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
    }

    #[test]
    fn test_task_serializes_with_contract_field_names() {
        let task = DownloadTask::pending(3, "a.png".into(), PathBuf::from("/x/a.png"), Utc::now());
        let value = serde_json::to_value(&task).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "id",
            "fileName",
            "totalBytes",
            "doneBytes",
            "status",
            "startTime",
            "downloadSpeed",
            "eta",
            "queuePosition",
            "enqueuedAt",
        ] {
            assert!(object.contains_key(key), "missing {key} in {value}");
        }
        assert!(!object.contains_key("error"));
        assert!(!object.contains_key("completedAt"));
        assert!(!object.contains_key("filePath"));
        assert_eq!(object["status"], "pending");
    }

    #[test]
    fn test_failed_task_serializes_error_and_completion() {
        let mut task = DownloadTask::pending(1, "f".into(), PathBuf::new(), Utc::now());
        task.status = DownloadStatus::Failed;
        task.error = "HTTP 404 downloading x".into();
        task.completed_at = Some(Utc::now());

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "HTTP 404 downloading x");
        assert!(value.get("completedAt").is_some());
    }

    #[test]
    fn test_count_serializes_aggregates() {
        let count = TaskStatusCount {
            total: 4,
            pending: 1,
            in_progress: 1,
            completed: 1,
            failed: 1,
        };
        let value = serde_json::to_value(count).unwrap();
        assert_eq!(value["inProgress"], 1);
        assert_eq!(value["total"], 4);
        assert!(!count.all_finished());
    }
}
