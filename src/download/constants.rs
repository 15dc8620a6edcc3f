//! Constants for the download module (timeouts, engine defaults).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default number of workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Default capacity of the bounded job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default directory downloads are saved under.
pub const DEFAULT_TARGET_DIR: &str = "./downloads";

/// Suffix appended to the final path while a transfer is in flight.
pub const TEMP_SUFFIX: &str = ".tmp";
