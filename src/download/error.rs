//! Error types for the download module.
//!
//! Every failure a job can hit is one variant of [`DownloadError`]. Admission
//! failures (`Validation`, `Conflict`, `QueueClosed`) come back synchronously
//! inside an [`EnqueueResult`](super::EnqueueResult); everything else is
//! recorded on the monitor task and handed to the error callback. Jobs still
//! queued when the engine stops fail the second way with `QueueClosed`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::client::TransportError;

/// Errors that can occur while admitting or running a download job.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request is malformed or cannot be admitted.
    #[error("invalid request: {reason}")]
    Validation {
        /// Human-readable explanation.
        reason: String,
    },

    /// A file already exists at the destination and overwrite is disabled.
    #[error("file already exists: {path}")]
    Conflict {
        /// The destination that is already taken.
        path: PathBuf,
    },

    /// Transport-level failure reaching or reading from the remote.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The server answered with a non-success status code.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Local filesystem failure (directory creation, temp write, rename).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine has been stopped and no longer accepts jobs.
    #[error("download queue is closed")]
    QueueClosed,
}

/// Stable classification of a [`DownloadError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadErrorKind {
    Validation,
    Conflict,
    Network,
    Http,
    Io,
    QueueClosed,
}

impl DownloadErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Network => "network",
            Self::Http => "http",
            Self::Io => "io",
            Self::QueueClosed => "queue_closed",
        }
    }
}

impl fmt::Display for DownloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DownloadError {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a destination conflict error.
    pub fn conflict(path: impl Into<PathBuf>) -> Self {
        Self::Conflict { path: path.into() }
    }

    /// Creates a network error from any transport error.
    pub fn network(url: impl Into<String>, source: impl Into<TransportError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> DownloadErrorKind {
        match self {
            Self::Validation { .. } => DownloadErrorKind::Validation,
            Self::Conflict { .. } => DownloadErrorKind::Conflict,
            Self::Network { .. } => DownloadErrorKind::Network,
            Self::HttpStatus { .. } => DownloadErrorKind::Http,
            Self::Io { .. } => DownloadErrorKind::Io,
            Self::QueueClosed => DownloadErrorKind::QueueClosed,
        }
    }
}

// No blanket `From<std::io::Error>`: every variant needs the path or URL the
// source error doesn't carry, so callers go through the constructors above.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_conflict_display() {
        let error = DownloadError::conflict("/tmp/downloads/a.png");
        let msg = error.to_string();
        assert!(msg.contains("already exists"), "Expected conflict in: {msg}");
        assert!(msg.contains("/tmp/downloads/a.png"), "Expected path in: {msg}");
        assert_eq!(error.kind(), DownloadErrorKind::Conflict);
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://example.com/file.pdf", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(
            msg.contains("https://example.com/file.pdf"),
            "Expected URL in: {msg}"
        );
        assert_eq!(error.kind(), DownloadErrorKind::Http);
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.pdf"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.pdf"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_download_error_network_keeps_source() {
        let error = DownloadError::network("https://example.com/x", "connection reset");
        assert_eq!(error.kind(), DownloadErrorKind::Network);
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "connection reset");
    }

    #[test]
    fn test_download_error_kind_labels() {
        assert_eq!(DownloadErrorKind::Validation.to_string(), "validation");
        assert_eq!(DownloadErrorKind::QueueClosed.to_string(), "queue_closed");
        assert_eq!(
            DownloadError::QueueClosed.kind(),
            DownloadErrorKind::QueueClosed
        );
    }
}
