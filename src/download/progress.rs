//! Byte-counting tap between the response body and the temp file.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::monitor::{Monitor, ProgressUpdate};

/// Bytes per MB for speed reporting.
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// ETA reported when the total size is unknown.
pub const ETA_UNKNOWN: &str = "unknown";

/// ETA reported until a positive rate has been measured.
pub const ETA_CALCULATING: &str = "calculating...";

/// Counts bytes of one transfer and forwards speed/ETA to the monitor.
///
/// Only sees chunks that were already read successfully, so it has no
/// failure mode of its own.
#[derive(Debug)]
pub struct ProgressWriter {
    id: u64,
    total: i64,
    written: u64,
    started: Option<Instant>,
    monitor: Arc<dyn Monitor>,
}

impl ProgressWriter {
    /// Creates a writer for job `id`; `total` is `-1` when unknown.
    pub fn new(id: u64, total: i64, monitor: Arc<dyn Monitor>) -> Self {
        Self {
            id,
            total,
            written: 0,
            started: None,
            monitor,
        }
    }

    /// Records a chunk of `len` bytes and reports the new totals.
    pub fn observe(&mut self, len: usize) {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.written = self.written.saturating_add(len as u64);

        let (speed, eta) = measure(self.written, self.total, started.elapsed());
        self.monitor.update_progress(
            self.id,
            ProgressUpdate {
                done_bytes: i64::try_from(self.written).unwrap_or(i64::MAX),
                total_bytes: self.total,
                speed,
                eta,
            },
        );
    }

    /// Bytes observed so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Computes `(speed in MB/s rounded to one decimal, ETA string)`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn measure(written: u64, total: i64, elapsed: Duration) -> (f64, String) {
    let seconds = elapsed.as_secs_f64();
    let bytes_per_sec = if seconds > 0.0 {
        written as f64 / seconds
    } else {
        0.0
    };
    let speed = (bytes_per_sec / BYTES_PER_MB * 10.0).round() / 10.0;

    let eta = if total < 0 {
        ETA_UNKNOWN.to_string()
    } else if bytes_per_sec > 0.0 {
        let remaining = (total as f64 - written as f64).max(0.0);
        format_eta(Duration::from_secs_f64(remaining / bytes_per_sec))
    } else {
        ETA_CALCULATING.to_string()
    };

    (speed, eta)
}

/// Formats a duration as `1h2m3s`, `4m5s` or `6s`, rounded to whole seconds.
pub(crate) fn format_eta(duration: Duration) -> String {
    let total = duration.as_secs() + u64::from(duration.subsec_millis() >= 500);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
