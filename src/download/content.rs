//! Content inspection helpers: declared size and best-effort MIME type.
//!
//! Neither helper ever fails. An unresolvable size becomes [`UNKNOWN_SIZE`],
//! and MIME resolution degrades down to [`GENERIC_MIME_TYPE`].

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};

/// Sentinel for a body whose length cannot be determined.
pub const UNKNOWN_SIZE: i64 = -1;

/// Generic binary type; treated as "no information" when a server sends it.
pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// Number of leading bytes kept for content sniffing.
pub const SNIFF_LEN: usize = 512;

/// Resolves the byte count to report progress against.
///
/// Order: the transport's declared length, then a `Content-Length` header
/// (covers transports that drop the length for chunked responses), then the
/// total from a `Content-Range` header. Anything else is [`UNKNOWN_SIZE`].
#[must_use]
pub fn resolve_file_size(content_length: Option<u64>, headers: &HeaderMap) -> i64 {
    if let Some(size) = content_length
        .and_then(|len| i64::try_from(len).ok())
        .filter(|len| *len > 0)
    {
        return size;
    }

    if let Some(size) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|len| *len > 0)
    {
        return size;
    }

    // "bytes 0-999/1000" or "bytes */1000"; a "*" total means unknown.
    if let Some(size) = headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit_once('/'))
        .map(|(_, total)| total.trim())
        .filter(|total| *total != "*")
        .and_then(|total| total.parse::<i64>().ok())
        .filter(|len| *len > 0)
    {
        return size;
    }

    UNKNOWN_SIZE
}

/// Resolves the MIME type of a committed download. First match wins:
///
/// 1. the response `Content-Type`, unless it is the generic binary type
/// 2. the caller's hint on the request
/// 3. a lookup by the file name's extension
/// 4. sniffing the first bytes of the file
#[must_use]
pub fn resolve_mime_type(
    response_type: Option<&str>,
    hint: Option<&str>,
    file_name: &str,
    head: &[u8],
) -> String {
    if let Some(declared) = response_type.map(str::trim).filter(|t| !t.is_empty())
        && !essence(declared).eq_ignore_ascii_case(GENERIC_MIME_TYPE)
    {
        return declared.to_string();
    }

    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        return hint.to_string();
    }

    if let Some(by_extension) = mime_from_extension(file_name) {
        return by_extension.to_string();
    }

    sniff_mime_type(head).to_string()
}

/// Looks up a MIME type from the extension of `file_name`.
#[must_use]
pub fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "json" => "application/json",
        "xml" => "application/xml",
        "wasm" => "application/wasm",
        "epub" => "application/epub+zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        _ => return None,
    };
    Some(mime)
}

/// Detects a MIME type from leading file bytes.
///
/// Magic numbers via `infer`, then HTML and plain-text heuristics, then the
/// generic binary type.
#[must_use]
pub fn sniff_mime_type(head: &[u8]) -> &'static str {
    let head = &head[..head.len().min(SNIFF_LEN)];
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }
    if head.is_empty() {
        return "text/plain; charset=utf-8";
    }
    if looks_like_html(head) {
        return "text/html; charset=utf-8";
    }
    if looks_like_text(head) {
        return "text/plain; charset=utf-8";
    }
    GENERIC_MIME_TYPE
}

fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let trimmed = &head[start..];
    ["<!doctype html", "<html", "<head", "<body"]
        .iter()
        .any(|tag| {
            trimmed.len() >= tag.len() && trimmed[..tag.len()].eq_ignore_ascii_case(tag.as_bytes())
        })
}

fn looks_like_text(head: &[u8]) -> bool {
    // A truncated multi-byte sequence at the cut-off is still text.
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !head
            .iter()
            .any(|b| b.is_ascii_control() && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_resolve_file_size_prefers_declared_length() {
        let map = headers(&[("content-length", "10")]);
        assert_eq!(resolve_file_size(Some(42), &map), 42);
    }

    #[test]
    fn test_resolve_file_size_reads_content_length_header() {
        let map = headers(&[("content-length", " 1234 ")]);
        assert_eq!(resolve_file_size(None, &map), 1234);
        assert_eq!(resolve_file_size(Some(0), &map), 1234);
    }

    #[test]
    fn test_resolve_file_size_reads_content_range_total() {
        let map = headers(&[("content-range", "bytes 0-999/5000")]);
        assert_eq!(resolve_file_size(None, &map), 5000);

        let map = headers(&[("content-range", "bytes */777")]);
        assert_eq!(resolve_file_size(None, &map), 777);
    }

    #[test]
    fn test_resolve_file_size_unknown_cases() {
        assert_eq!(resolve_file_size(None, &HeaderMap::new()), UNKNOWN_SIZE);

        let map = headers(&[("content-range", "bytes 0-999/*")]);
        assert_eq!(resolve_file_size(None, &map), UNKNOWN_SIZE);

        let map = headers(&[("content-length", "abc"), ("content-range", "garbage")]);
        assert_eq!(resolve_file_size(None, &map), UNKNOWN_SIZE);
    }

    #[test]
    fn test_resolve_mime_uses_specific_response_type() {
        let mime = resolve_mime_type(
            Some("image/jpeg"),
            Some("image/png"),
            "photo.png",
            PNG_MAGIC,
        );
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn test_resolve_mime_skips_generic_response_type_for_extension() {
        let mime = resolve_mime_type(Some("application/octet-stream"), None, "icon.png", b"");
        assert_eq!(mime, "image/png");

        let mime = resolve_mime_type(
            Some("Application/Octet-Stream; charset=binary"),
            None,
            "icon.png",
            b"",
        );
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn test_resolve_mime_prefers_hint_over_extension() {
        let mime = resolve_mime_type(None, Some("video/mp4"), "clip.bin", b"");
        assert_eq!(mime, "video/mp4");
    }

    #[test]
    fn test_resolve_mime_sniffs_when_nothing_else_matches() {
        let mime = resolve_mime_type(Some(GENERIC_MIME_TYPE), None, "blob", PNG_MAGIC);
        assert_eq!(mime, "image/png");

        let mime = resolve_mime_type(None, None, "noext", b"plain words\n");
        assert_eq!(mime, "text/plain; charset=utf-8");
    }

    #[test]
    fn test_mime_from_extension_cases() {
        assert_eq!(mime_from_extension("a.PNG"), Some("image/png"));
        assert_eq!(mime_from_extension("archive.tar.gz"), Some("application/gzip"));
        assert_eq!(mime_from_extension("noext"), None);
        assert_eq!(mime_from_extension("weird.unknownext"), None);
    }

    #[test]
    fn test_sniff_mime_type_heuristics() {
        assert_eq!(
            sniff_mime_type(b"  <!DOCTYPE html><html></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(sniff_mime_type(&[0x00, 0x01, 0x02, 0xff]), GENERIC_MIME_TYPE);
        assert_eq!(sniff_mime_type(b"%PDF-1.7\n"), "application/pdf");
    }
}
