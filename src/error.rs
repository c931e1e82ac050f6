//! Error types for the researchaid-docgen library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`DocGenError`] (**fatal**): the request cannot be completed (every PDF
//!   engine failed, the uploaded file cannot be parsed, the package writer
//!   broke). Returned as `Err(DocGenError)` from every public entry point.
//!
//! * [`OracleFailure`]: a failed completion call, classified so the caller
//!   can tell a misconfigured key from a rate limit or a timeout. Carried
//!   inside [`DocGenError::Oracle`] and never retried by this crate.
//!
//! * [`ClassificationDegraded`] (**non-fatal**): a line looked structural but
//!   no rule claimed it, so it was kept as a paragraph. Collected next to the
//!   built blocks so callers can log or ignore it; output is never withheld.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the researchaid-docgen library.
#[derive(Debug, Error)]
pub enum DocGenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Caller supplied empty or otherwise unusable input.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file is neither PDF, DOCX nor UTF-8 text.
    #[error("Unsupported document format for '{path}': {detail}\nSupported: .pdf, .docx, .txt, .md")]
    UnsupportedFormat { path: PathBuf, detail: String },

    /// Ingestion could not read the document content.
    #[error("Failed to parse '{source_name}': {detail}")]
    ParseFailure { source_name: String, detail: String },

    /// No stored document has this id.
    #[error("Document '{id}' not found")]
    DocumentNotFound { id: String },

    // ── Oracle errors ─────────────────────────────────────────────────────
    /// The completion oracle failed; see [`OracleFailure::user_message`].
    #[error(transparent)]
    Oracle(#[from] OracleFailure),

    // ── Render errors ─────────────────────────────────────────────────────
    /// The primary engine failed for a reason that does not justify falling
    /// back (the failure has no missing-native-library signature).
    #[error("PDF engine '{engine}' failed: {detail}")]
    RenderFailed { engine: String, detail: String },

    /// Every engine in the strategy list failed.
    #[error(
        "No PDF engine could render the document.\nAttempts:\n  {}\n\
Install chromium or wkhtmltopdf, or keep the text-only engine enabled.",
        .attempts.join("\n  ")
    )]
    RenderUnavailable { attempts: Vec<String> },

    /// The DOCX package could not be written.
    #[error("Failed to serialise document model: {0}")]
    SerializationFailure(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library (needed only for PDF ingestion).
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF text extraction needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A classified failure of the completion oracle.
///
/// The variants mirror how callers must react: fix configuration, wait,
/// shorten the request, or report the raw message.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OracleFailure {
    /// Missing or rejected credentials (HTTP 401/403, no API key).
    #[error("Authentication error from provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// HTTP 429 or an explicit quota message.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The call did not finish in time.
    #[error("Completion timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Anything else the provider reported.
    #[error("LLM API error: {detail}")]
    Unknown { detail: String },
}

impl OracleFailure {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            OracleFailure::Auth { .. } => "The language model API key is not configured or was \
rejected. Set OPENAI_API_KEY (or another provider key) and try again."
                .to_string(),
            OracleFailure::RateLimited { .. } => {
                "Rate limit exceeded. Please try again in a few moments.".to_string()
            }
            OracleFailure::Timeout { .. } => "Request timeout. The generation is taking too long. \
Please try with a shorter input."
                .to_string(),
            OracleFailure::Unknown { detail } => detail.clone(),
        }
    }

    /// Classify a provider error from its rendered message.
    ///
    /// Providers report failures as free text; status codes and a handful
    /// of phrases are stable enough to route on.
    pub fn from_message(provider: &str, message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("api_key")
            || lower.contains("unauthorized")
            || lower.contains("authentication")
        {
            OracleFailure::Auth {
                provider: provider.to_string(),
                detail: message.to_string(),
            }
        } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("ratelimit") {
            OracleFailure::RateLimited {
                provider: provider.to_string(),
                retry_after_secs: None,
            }
        } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("etimedout") {
            OracleFailure::Timeout { elapsed_ms: 0 }
        } else {
            OracleFailure::Unknown {
                detail: message.to_string(),
            }
        }
    }
}

/// A non-fatal classification note.
///
/// Stored alongside the built blocks; the affected line is still rendered
/// (as a paragraph), so these never stop a document from being produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ClassificationDegraded {
    /// A line started with structural syntax but fell through to prose.
    #[error("Line {line}: '{prefix}' matched no structural rule, kept as paragraph")]
    ParagraphFallback { line: usize, prefix: String },

    /// A numbered line was too long (or lowercase) to be a heading.
    #[error("Line {line}: numbered line rejected as heading ({reason})")]
    HeadingRejected { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_unavailable_lists_every_attempt() {
        let e = DocGenError::RenderUnavailable {
            attempts: vec![
                "chromium: libnss3.so missing".into(),
                "wkhtmltopdf: not found".into(),
                "text-only: empty".into(),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("chromium"), "got: {msg}");
        assert!(msg.contains("wkhtmltopdf"), "got: {msg}");
        assert!(msg.contains("text-only"), "got: {msg}");
    }

    #[test]
    fn oracle_failure_is_transparent() {
        let e: DocGenError = OracleFailure::Timeout { elapsed_ms: 5000 }.into();
        assert!(e.to_string().contains("5000ms"));
    }

    #[test]
    fn classify_auth_messages() {
        let f = OracleFailure::from_message("openai", "HTTP 401: invalid api key");
        assert!(matches!(f, OracleFailure::Auth { .. }));
        let f = OracleFailure::from_message("openai", "API key not configured");
        assert!(matches!(f, OracleFailure::Auth { .. }));
    }

    #[test]
    fn classify_rate_limit_and_timeout() {
        assert!(matches!(
            OracleFailure::from_message("gemini", "status 429 Too Many Requests"),
            OracleFailure::RateLimited { .. }
        ));
        assert!(matches!(
            OracleFailure::from_message("gemini", "request timed out"),
            OracleFailure::Timeout { .. }
        ));
        assert!(matches!(
            OracleFailure::from_message("gemini", "model overloaded"),
            OracleFailure::Unknown { .. }
        ));
    }

    #[test]
    fn user_messages_are_distinct() {
        let auth = OracleFailure::Auth {
            provider: "openai".into(),
            detail: "x".into(),
        };
        let rate = OracleFailure::RateLimited {
            provider: "openai".into(),
            retry_after_secs: Some(30),
        };
        let timeout = OracleFailure::Timeout { elapsed_ms: 1 };
        assert!(auth.user_message().contains("API key"));
        assert!(rate.user_message().starts_with("Rate limit exceeded"));
        assert!(timeout.user_message().starts_with("Request timeout"));
        assert_eq!(
            OracleFailure::Unknown {
                detail: "boom".into()
            }
            .user_message(),
            "boom"
        );
    }

    #[test]
    fn degraded_note_display() {
        let n = ClassificationDegraded::ParagraphFallback {
            line: 12,
            prefix: "#".into(),
        };
        assert!(n.to_string().contains("Line 12"));
    }
}
