//! Request, result, and admission types shared by the engine and monitor.

use std::path::{Path, PathBuf};

use super::content::mime_from_extension;
use super::error::DownloadError;

/// A single download job as submitted by the caller.
///
/// `file_name` and `full_path` are filled in by the validator at admission
/// time; after that the request is treated as immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Caller-assigned identity, unique among in-flight jobs.
    pub id: u64,
    /// Remote resource to fetch.
    pub url: String,
    /// File name to save as. Derived from the URL when `None`.
    pub file_name: Option<String>,
    /// Optional sub-directory, relative to the engine's target directory.
    pub path: Option<PathBuf>,
    /// MIME type hint used when the server doesn't declare a useful one.
    pub mime_type: Option<String>,
    /// Resolved destination. Only the validator sets it.
    pub(crate) full_path: Option<PathBuf>,
}

impl DownloadRequest {
    /// Creates a request with only the required fields set.
    #[must_use]
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Resolved destination, known once the request has been validated.
    #[must_use]
    pub fn full_path(&self) -> Option<&Path> {
        self.full_path.as_deref()
    }

    /// File name, or an empty string before validation.
    #[must_use]
    pub fn file_name_or_default(&self) -> &str {
        self.file_name.as_deref().unwrap_or_default()
    }
}

/// Terminal success payload, produced exactly once per completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub id: u64,
    pub file_name: String,
    /// Final location of the committed file.
    pub path: PathBuf,
    /// Best-effort MIME type; never empty.
    pub mime_type: String,
}

impl DownloadResult {
    /// Returns true if the file looks like an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.is_of_type("image")
    }

    /// Returns true if the file looks like a video.
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.is_of_type("video")
    }

    /// Returns true if the file looks like audio.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.is_of_type("audio")
    }

    /// Checks the MIME type first, then falls back to the file extension.
    fn is_of_type(&self, category: &str) -> bool {
        let prefix = format!("{}/", category.to_ascii_lowercase());
        if self.mime_type.to_ascii_lowercase().starts_with(&prefix) {
            return true;
        }
        mime_from_extension(&self.file_name).is_some_and(|mime| mime.starts_with(&prefix))
    }
}

/// Outcome of submitting a request to the engine.
///
/// Describes admission only; transfer outcomes are reported through the
/// monitor and the engine callbacks.
#[derive(Debug)]
pub struct EnqueueResult {
    /// The request as resolved by the validator (or as submitted, if it was
    /// rejected before resolution).
    pub request: DownloadRequest,
    /// True when the job was registered and placed on the queue.
    pub queued: bool,
    /// Why the job was not queued.
    pub error: Option<DownloadError>,
}

impl EnqueueResult {
    pub(crate) fn queued(request: DownloadRequest) -> Self {
        Self {
            request,
            queued: true,
            error: None,
        }
    }

    pub(crate) fn rejected(request: DownloadRequest, error: DownloadError) -> Self {
        Self {
            request,
            queued: false,
            error: Some(error),
        }
    }

    /// Returns true if the job was admitted.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(file_name: &str, mime_type: &str) -> DownloadResult {
        DownloadResult {
            id: 1,
            file_name: file_name.to_string(),
            path: PathBuf::from("/tmp").join(file_name),
            mime_type: mime_type.to_string(),
        }
    }

    #[test]
    fn test_request_builder_sets_optional_fields() {
        let request = DownloadRequest::new(7, "https://example.com/a.bin")
            .with_file_name("b.bin")
            .with_path("nested/dir")
            .with_mime_type("application/x-custom");

        assert_eq!(request.id, 7);
        assert_eq!(request.file_name.as_deref(), Some("b.bin"));
        assert_eq!(request.path, Some(PathBuf::from("nested/dir")));
        assert_eq!(request.mime_type.as_deref(), Some("application/x-custom"));
        assert!(request.full_path().is_none());
    }

    #[test]
    fn test_result_category_from_mime_type() {
        assert!(result("blob", "image/png").is_image());
        assert!(result("blob", "Video/MP4").is_video());
        assert!(result("blob", "audio/mpeg").is_audio());
        assert!(!result("blob", "application/pdf").is_image());
    }

    #[test]
    fn test_result_category_falls_back_to_extension() {
        let clip = result("clip.m4v", "application/octet-stream");
        assert!(clip.is_video());
        assert!(!clip.is_audio());
        assert!(result("song.MP3", "").is_audio());
        assert!(!result("notes", "").is_image());
    }

    #[test]
    fn test_enqueue_result_constructors() {
        let ok = EnqueueResult::queued(DownloadRequest::new(1, "https://e.com/x"));
        assert!(ok.is_queued());
        assert!(ok.error.is_none());

        let rejected = EnqueueResult::rejected(
            DownloadRequest::new(2, "https://e.com/y"),
            DownloadError::QueueClosed,
        );
        assert!(!rejected.is_queued());
        assert!(matches!(rejected.error, Some(DownloadError::QueueClosed)));
    }
}
