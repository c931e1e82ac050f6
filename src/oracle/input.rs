//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! Extraction backends want a file-system path (pdfium cannot read from a
//! socket), so URLs are downloaded into a `TempDir` that lives as long as
//! the returned [`ResolvedInput`]. Content is sniffed before returning so an
//! unsupported upload fails here with a clear message rather than deep in a
//! parser.

use crate::error::DocGenError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Content family detected from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    /// A zip container; assumed to be an Office Open XML document.
    Docx,
    /// UTF-8 text or markdown.
    Text,
}

impl InputFormat {
    /// MIME type handed to the extractor.
    pub fn mime(self) -> &'static str {
        match self {
            InputFormat::Pdf => "application/pdf",
            InputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            InputFormat::Text => "text/plain",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            InputFormat::Pdf => "pdf",
            InputFormat::Docx => "docx",
            InputFormat::Text => "txt",
        }
    }
}

/// The resolved input: a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    Local { path: PathBuf, format: InputFormat },
    /// The `TempDir` is held so the file survives until processing completes.
    Downloaded {
        path: PathBuf,
        format: InputFormat,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } | ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn format(&self) -> InputFormat {
        match self {
            ResolvedInput::Local { format, .. } | ResolvedInput::Downloaded { format, .. } => {
                *format
            }
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify content by its leading bytes. `None` for binary data that is
/// neither PDF nor zip.
pub fn sniff_format(head: &[u8]) -> Option<InputFormat> {
    if head.starts_with(b"%PDF") {
        Some(InputFormat::Pdf)
    } else if head.starts_with(b"PK\x03\x04") {
        Some(InputFormat::Docx)
    } else if looks_like_text(head) {
        Some(InputFormat::Text)
    } else {
        None
    }
}

/// UTF-8 with no NUL bytes. A multi-byte sequence cut at the end of the
/// sample is tolerated.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Resolve the input string to a local file.
///
/// URLs are downloaded with the given timeout; local paths are checked for
/// existence, readability and a supported format.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocGenError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocGenError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocGenError::FileNotFound { path });
    }

    let mut head = Vec::with_capacity(512);
    match std::fs::File::open(&path) {
        Ok(f) => {
            f.take(512)
                .read_to_end(&mut head)
                .map_err(|e| DocGenError::ParseFailure {
                    source_name: path.display().to_string(),
                    detail: e.to_string(),
                })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocGenError::PermissionDenied { path });
        }
        Err(_) => return Err(DocGenError::FileNotFound { path }),
    }

    let format = sniff_format(&head).ok_or_else(|| DocGenError::UnsupportedFormat {
        path: path.clone(),
        detail: format!("unrecognised leading bytes {:02x?}", &head[..head.len().min(4)]),
    })?;

    debug!("Resolved local {:?}: {}", format, path.display());
    Ok(ResolvedInput::Local { path, format })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocGenError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocGenError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocGenError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocGenError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DocGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocGenError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let format = sniff_format(&bytes[..bytes.len().min(512)]).ok_or_else(|| {
        DocGenError::UnsupportedFormat {
            path: PathBuf::from(url),
            detail: "downloaded content is neither PDF, DOCX nor text".into(),
        }
    })?;

    let temp_dir = TempDir::new().map_err(|e| DocGenError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(download_filename(url, format));

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocGenError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        format,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it has an extension, else `downloaded.{ext}`.
fn download_filename(url: &str, format: InputFormat) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    format!("downloaded.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/paper.pdf"));
        assert!(is_url("http://example.com/paper.pdf"));
        assert!(!is_url("/tmp/paper.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn sniff_by_magic() {
        assert_eq!(sniff_format(b"%PDF-1.7\n"), Some(InputFormat::Pdf));
        assert_eq!(sniff_format(b"PK\x03\x04rest"), Some(InputFormat::Docx));
        assert_eq!(sniff_format("# Title\nBody".as_bytes()), Some(InputFormat::Text));
        assert_eq!(sniff_format(b"\x00\x01\x02\x03"), None);
    }

    #[test]
    fn truncated_utf8_is_still_text() {
        let s = "caf\u{e9}".as_bytes();
        assert_eq!(sniff_format(&s[..s.len() - 1]), Some(InputFormat::Text));
    }

    #[test]
    fn download_filename_uses_url_or_format() {
        assert_eq!(
            download_filename("https://x.org/a/paper.pdf", InputFormat::Pdf),
            "paper.pdf"
        );
        assert_eq!(
            download_filename("https://x.org/a/", InputFormat::Docx),
            "downloaded.docx"
        );
    }

    #[tokio::test]
    async fn local_missing_file() {
        let err = resolve_input("/nonexistent/paper.pdf", 5).await.unwrap_err();
        assert!(matches!(err, DocGenError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_text_file_resolves() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "1. Introduction\nSome text.").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.format(), InputFormat::Text);
        assert_eq!(resolved.path(), f.path());
    }

    #[tokio::test]
    async fn local_binary_file_is_unsupported() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0u8, 159, 146, 150]).unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, DocGenError::UnsupportedFormat { .. }));
    }
}
