//! Concurrent HTTP download engine with atomic file commits.
//!
//! This module provides the [`Fetcher`] worker pool and everything a job
//! passes through on its way to disk:
//!
//! - [`RequestValidator`] - derives file names and destinations, rejects
//!   unusable or conflicting requests
//! - [`Transport`] / [`HttpClient`] - GET with a streamed body
//! - [`ProgressWriter`] - byte counter reporting speed and ETA to a monitor
//! - content inspection - file size and MIME type resolution
//!
//! Files are streamed to `<destination>.tmp` and renamed into place once
//! complete.

mod client;
mod constants;
mod content;
mod engine;
mod error;
mod pipeline;
mod progress;
mod types;
mod validation;

pub use client::{BodyStream, HttpClient, Transport, TransportError, TransportResponse};
pub use constants::{
    DEFAULT_MAX_WORKERS, DEFAULT_QUEUE_CAPACITY, DEFAULT_TARGET_DIR, MAX_WORKERS, MIN_WORKERS,
};
pub use content::{
    GENERIC_MIME_TYPE, UNKNOWN_SIZE, mime_from_extension, resolve_file_size, resolve_mime_type,
    sniff_mime_type,
};
pub use engine::{
    CompletionCallback, EngineError, ErrorCallback, Fetcher, FetcherConfig, FetcherState,
};
pub use error::{DownloadError, DownloadErrorKind};
pub use progress::{ETA_CALCULATING, ETA_UNKNOWN, ProgressWriter};
pub use types::{DownloadRequest, DownloadResult, EnqueueResult};
pub use validation::RequestValidator;

// Note: no module-local Result alias. Spell out `Result<T, DownloadError>`.
