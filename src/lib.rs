//! dlfetch Core Library
//!
//! Concurrent file downloads with live progress tracking. Requests are
//! validated up front, queued, and transferred by a fixed pool of workers
//! that commit each file atomically.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - request validation, HTTP transport, the download
//!   pipeline and the [`Fetcher`] worker pool
//! - [`monitor`] - task registry, status counts, queue positions and the
//!   coalescing change signal

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod monitor;

// Re-export commonly used types
pub use download::{
    DEFAULT_MAX_WORKERS, DownloadError, DownloadErrorKind, DownloadRequest, DownloadResult,
    EngineError, EnqueueResult, Fetcher, FetcherConfig, FetcherState, HttpClient, Transport,
};
pub use monitor::{
    ChangeSignal, DownloadStatus, DownloadTask, Monitor, MonitorSnapshot, NoopMonitor,
    ProgressMonitor, TaskStatusCount,
};
