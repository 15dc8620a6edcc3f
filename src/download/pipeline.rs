//! End-to-end processing of one job: re-check, transfer, atomic commit.
//!
//! Bytes are streamed to `<final>.tmp` and only renamed onto the final path
//! once the whole body is on disk, so readers never see a partial file at
//! the destination.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::client::{BodyStream, Transport};
use super::constants::TEMP_SUFFIX;
use super::content::{SNIFF_LEN, resolve_file_size, resolve_mime_type};
use super::error::DownloadError;
use super::progress::ProgressWriter;
use super::types::{DownloadRequest, DownloadResult};
use crate::monitor::Monitor;

/// Runs validated requests against a transport, reporting to a monitor.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    transport: Arc<dyn Transport>,
    monitor: Arc<dyn Monitor>,
    overwrite: bool,
}

impl Pipeline {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        monitor: Arc<dyn Monitor>,
        overwrite: bool,
    ) -> Self {
        Self {
            transport,
            monitor,
            overwrite,
        }
    }

    /// Downloads one request and records the outcome on the monitor.
    ///
    /// Every failure is terminal for the job: the task is marked failed with
    /// the error's message and the error is returned. Nothing is retried.
    #[instrument(skip(self, request), fields(id = request.id, url = %request.url))]
    pub(crate) async fn run(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        self.monitor.mark_started(request.id);

        match self.execute(request).await {
            Ok(result) => {
                self.monitor.mark_completed(request.id);
                info!(
                    path = %result.path.display(),
                    mime_type = %result.mime_type,
                    "download completed"
                );
                Ok(result)
            }
            Err(error) => {
                self.monitor.mark_failed(request.id, &error.to_string());
                warn!(error = %error, kind = %error.kind(), "download failed");
                Err(error)
            }
        }
    }

    async fn execute(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let full_path = request.full_path.clone().ok_or_else(|| {
            DownloadError::validation(format!("request {} was not validated", request.id))
        })?;
        let file_name = request.file_name.clone().unwrap_or_else(|| {
            full_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        // The validator checked this at admission; the file may have appeared
        // while the job sat in the queue.
        if !self.overwrite && destination_exists(&full_path).await {
            return Err(DownloadError::conflict(full_path));
        }

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let response = self
            .transport
            .get(&request.url)
            .await
            .map_err(|e| DownloadError::network(&request.url, e))?;

        if !response.is_success() {
            return Err(DownloadError::http_status(&request.url, response.status));
        }

        let total = resolve_file_size(response.content_length, &response.headers);
        let content_type = response.content_type().map(str::to_string);
        debug!(total, content_type = ?content_type, "streaming response body");

        let temp_path = temp_path_for(&full_path);
        let progress = ProgressWriter::new(request.id, total, Arc::clone(&self.monitor));
        let head = match stream_to_temp(response.body, &temp_path, progress, &request.url).await {
            Ok(head) => head,
            Err(error) => {
                remove_litter(&temp_path).await;
                return Err(error);
            }
        };

        self.commit(&temp_path, &full_path).await?;

        let mime_type = resolve_mime_type(
            content_type.as_deref(),
            request.mime_type.as_deref(),
            &file_name,
            &head,
        );

        Ok(DownloadResult {
            id: request.id,
            file_name,
            path: full_path,
            mime_type,
        })
    }

    /// Renames the finished temp file onto the final path.
    async fn commit(&self, temp_path: &Path, full_path: &Path) -> Result<(), DownloadError> {
        if !self.overwrite && destination_exists(full_path).await {
            remove_litter(temp_path).await;
            return Err(DownloadError::conflict(full_path));
        }

        if let Err(e) = tokio::fs::rename(temp_path, full_path).await {
            remove_litter(temp_path).await;
            return Err(DownloadError::io(full_path, e));
        }
        debug!(path = %full_path.display(), "committed download");
        Ok(())
    }
}

/// Returns `<path>.tmp`.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(TEMP_SUFFIX);
    PathBuf::from(raw)
}

async fn destination_exists(path: &Path) -> bool {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    }
}

/// Streams the body into `temp_path`, returning the first bytes for sniffing.
///
/// A stale temp file from an earlier run is truncated.
async fn stream_to_temp(
    mut body: BodyStream,
    temp_path: &Path,
    mut progress: ProgressWriter,
    url: &str,
) -> Result<Vec<u8>, DownloadError> {
    let file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut head = Vec::with_capacity(SNIFF_LEN);

    while let Some(chunk_result) = body.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        if chunk.is_empty() {
            continue;
        }

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;

        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(chunk.len());
            head.extend_from_slice(&chunk[..take]);
        }
        progress.observe(chunk.len());
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;

    debug!(bytes = progress.written(), "body written to temp file");
    Ok(head)
}

/// Best-effort temp cleanup; a leftover file is logged, never escalated.
async fn remove_litter(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(path = %temp_path.display(), "removed partial temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), error = %e, "failed to remove partial temp file"),
    }
}
