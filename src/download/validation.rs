//! Request validation: file name derivation, destination resolution and the
//! advisory conflict check.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::error::DownloadError;
use super::types::DownloadRequest;

/// Normalizes raw requests into fully resolved ones.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    target_dir: PathBuf,
    overwrite: bool,
}

impl RequestValidator {
    /// Creates a validator resolving paths under `target_dir`.
    ///
    /// A relative `target_dir` is made absolute against the current
    /// directory once, here.
    pub fn new(target_dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        let target_dir = target_dir.into();
        let target_dir = std::path::absolute(&target_dir).unwrap_or(target_dir);
        Self {
            target_dir,
            overwrite,
        }
    }

    #[must_use]
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Fills in `file_name` and `full_path` and checks the destination.
    ///
    /// The conflict check is advisory: the pipeline repeats it before it
    /// writes. `full_path` is only computed if it is still unset; a preset
    /// one must already point inside the target directory.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Validation`] for an unusable URL, file name or path
    /// - [`DownloadError::Conflict`] if the destination exists and overwrite
    ///   is disabled
    pub fn validate(&self, request: &mut DownloadRequest) -> Result<(), DownloadError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(DownloadError::validation(format!(
                "request {} has an empty URL",
                request.id
            )));
        }
        let parsed = Url::parse(url)
            .map_err(|e| DownloadError::validation(format!("invalid URL {url}: {e}")))?;

        let file_name = match request.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                check_file_name(name)?;
                name.to_string()
            }
            _ => file_name_from_url(&parsed).ok_or_else(|| {
                DownloadError::validation(format!("cannot derive a file name from {url}"))
            })?,
        };

        if let Some(sub_path) = request.path.as_deref() {
            check_sub_path(sub_path)?;
        }

        let full_path = match request.full_path.clone() {
            Some(existing) => {
                self.check_inside_target(&existing)?;
                existing
            }
            None => {
                let mut full_path = self.target_dir.clone();
                if let Some(sub_path) = request.path.as_deref() {
                    full_path.push(sub_path);
                }
                full_path.push(&file_name);
                full_path
            }
        };

        request.file_name = Some(file_name);
        request.full_path = Some(full_path.clone());

        if !self.overwrite && path_taken(&full_path) {
            debug!(id = request.id, path = %full_path.display(), "destination already exists");
            return Err(DownloadError::conflict(full_path));
        }

        Ok(())
    }

    fn check_inside_target(&self, path: &Path) -> Result<(), DownloadError> {
        let inside = path.starts_with(&self.target_dir)
            && path != self.target_dir
            && !path.components().any(|c| c == Component::ParentDir);
        if !inside {
            return Err(DownloadError::validation(format!(
                "destination {} is outside the target directory {}",
                path.display(),
                self.target_dir.display()
            )));
        }
        Ok(())
    }
}

/// True unless the path is known not to exist; unreadable counts as taken.
pub(crate) fn path_taken(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    }
}

/// Derives a file name from the last non-empty URL path segment.
pub(crate) fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let name = sanitize_filename(&decoded);
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

/// Replaces characters that are invalid on common filesystems.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn check_file_name(name: &str) -> Result<(), DownloadError> {
    if name == "." || name == ".." || name.contains(['/', '\\']) || name.contains('\0') {
        return Err(DownloadError::validation(format!(
            "file name {name:?} must be a single path segment"
        )));
    }
    Ok(())
}

fn check_sub_path(path: &Path) -> Result<(), DownloadError> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(DownloadError::validation(format!(
            "path {} must be relative and stay inside the target directory",
            path.display()
        )));
    }
    Ok(())
}
