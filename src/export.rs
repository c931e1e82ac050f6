//! Export entry points: raw text in, a finished file out.
//!
//! ```text
//!  content ──▶ kind ──▶ classify + build ──▶ blocks ─┬─▶ HTML
//!                                                    ├─▶ DOCX
//!                                                    └─▶ HTML ──▶ PDF engines
//! ```
//!
//! All three formats come from the same block list, so headings, bold and
//! alignment agree between them.

use crate::config::DocGenConfig;
use crate::error::DocGenError;
use crate::model::{Block, DocumentKind};
use crate::oracle::DocumentStore;
use crate::pdf::{RenderPipeline, RenderRequest};
use crate::pipeline::build::{build_document, classify_and_build};
use crate::pipeline::container::{serialize_document_model, DOCX_CONTENT_TYPE};
use crate::pipeline::docx::{to_document_model_with, PageGeometry};
use crate::pipeline::html::to_html_with_config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Html,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => DOCX_CONTENT_TYPE,
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Html => "html",
        }
    }

    /// Download name used when the caller has none.
    pub fn default_file_name(self) -> String {
        format!("formatted_document.{}", self.extension())
    }

    /// Guess from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = DocGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(DocGenError::InvalidInput {
                reason: format!("invalid export format '{other}' (use pdf, docx or html)"),
            }),
        }
    }
}

/// A rendered file ready to be written or sent.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Kind the content was classified as.
    pub kind: DocumentKind,
    /// Lines the classifier could only treat as plain paragraphs.
    pub degraded_lines: usize,
}

/// Classify `content` and render it as `format`.
///
/// `kind` skips detection when the caller already knows what the text is.
pub async fn export(
    content: &str,
    kind: Option<DocumentKind>,
    format: ExportFormat,
    config: &DocGenConfig,
) -> Result<ExportedFile, DocGenError> {
    let (kind, blocks, degraded_lines) = match kind {
        Some(kind) => (kind, classify_and_build(content, kind), 0),
        None => {
            let report = build_document(content, &config.thresholds);
            (report.kind, report.blocks, report.degraded.len())
        }
    };
    debug!(
        "Exporting {} as {} ({} blocks, {} degraded lines)",
        kind,
        format,
        blocks.len(),
        degraded_lines
    );

    let bytes = render_blocks_as(content, blocks, format, config).await?;
    info!("Exported {} ({} bytes)", format, bytes.len());

    Ok(ExportedFile {
        format,
        content_type: format.content_type(),
        file_name: format.default_file_name(),
        bytes,
        kind,
        degraded_lines,
    })
}

async fn render_blocks_as(
    source: &str,
    blocks: Vec<Block>,
    format: ExportFormat,
    config: &DocGenConfig,
) -> Result<Vec<u8>, DocGenError> {
    match format {
        ExportFormat::Html => Ok(to_html_with_config(&blocks, config).into_bytes()),
        ExportFormat::Docx => {
            let page = PageGeometry::from_config(config);
            tokio::task::spawn_blocking(move || {
                let tree = to_document_model_with(&blocks, page);
                serialize_document_model(&tree)
            })
            .await
            .map_err(|e| DocGenError::Internal(format!("DOCX task panicked: {}", e)))?
        }
        ExportFormat::Pdf => {
            let html = to_html_with_config(&blocks, config);
            let request = RenderRequest::from_html(html)
                .with_source(source)
                .with_blocks(blocks)
                .with_thresholds(config.thresholds);
            RenderPipeline::from_config(config).render(&request).await
        }
    }
}

/// Export and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed export never leaves a
/// partial file behind.
pub async fn export_to_file(
    content: &str,
    kind: Option<DocumentKind>,
    format: ExportFormat,
    output_path: impl AsRef<Path>,
    config: &DocGenConfig,
) -> Result<ExportedFile, DocGenError> {
    let file = export(content, kind, format, config).await?;
    write_atomic(output_path.as_ref(), &file.bytes).await?;
    Ok(file)
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocGenError> {
    let fail = |e: std::io::Error| DocGenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

/// Export a document previously saved in `store`.
pub async fn export_stored(
    store: &dyn DocumentStore,
    id: &str,
    format: ExportFormat,
    config: &DocGenConfig,
) -> Result<ExportedFile, DocGenError> {
    let doc = store
        .get(id)
        .await?
        .ok_or_else(|| DocGenError::DocumentNotFound { id: id.to_string() })?;
    export(&doc.content, doc.kind, format, config).await
}

/// Synchronous wrapper around [`export`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(
    content: &str,
    kind: Option<DocumentKind>,
    format: ExportFormat,
    config: &DocGenConfig,
) -> Result<ExportedFile, DocGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(content, kind, format, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdfEngineKind;
    use crate::model::DocumentMetadata;
    use crate::oracle::store::MemoryStore;
    use crate::oracle::StoredDocument;

    fn text_only() -> DocGenConfig {
        DocGenConfig::builder()
            .engines(vec![PdfEngineKind::TextOnly])
            .build()
            .unwrap()
    }

    const REPORT: &str = "1. Introduction\nThis is the intro text.\n\n2. Methods\nWe measured things.";

    #[test]
    fn format_names_and_types() {
        assert_eq!(ExportFormat::Pdf.default_file_name(), "formatted_document.pdf");
        assert_eq!(ExportFormat::Html.content_type(), "text/html; charset=utf-8");
        assert!(ExportFormat::Docx.content_type().contains("wordprocessingml"));
        assert_eq!("DOCX".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert!("rtf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::from_path(Path::new("out/x.html")), Some(ExportFormat::Html));
    }

    #[tokio::test]
    async fn html_export_carries_headings() {
        let file = export(REPORT, Some(DocumentKind::GenericReport), ExportFormat::Html, &text_only())
            .await
            .unwrap();
        let html = String::from_utf8(file.bytes).unwrap();
        assert!(html.contains("Introduction"));
        assert_eq!(file.kind, DocumentKind::GenericReport);
    }

    #[tokio::test]
    async fn docx_export_is_a_zip() {
        let file = export(REPORT, None, ExportFormat::Docx, &text_only()).await.unwrap();
        assert!(file.bytes.starts_with(b"PK"));
        assert_eq!(file.file_name, "formatted_document.docx");
    }

    #[tokio::test]
    async fn pdf_export_uses_the_configured_chain() {
        let file = export(REPORT, None, ExportFormat::Pdf, &text_only()).await.unwrap();
        assert!(file.bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn file_export_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        export_to_file(REPORT, None, ExportFormat::Html, &path, &text_only())
            .await
            .unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("report.html.tmp").exists());
    }

    #[tokio::test]
    async fn stored_documents_export_and_missing_ones_fail() {
        let store = MemoryStore::new();
        store
            .save(
                "doc-1",
                StoredDocument {
                    content: REPORT.into(),
                    kind: None,
                    metadata: DocumentMetadata::default(),
                },
            )
            .await
            .unwrap();

        let file = export_stored(&store, "doc-1", ExportFormat::Html, &text_only())
            .await
            .unwrap();
        assert!(!file.bytes.is_empty());

        let err = export_stored(&store, "nope", ExportFormat::Pdf, &text_only())
            .await
            .unwrap_err();
        assert!(matches!(err, DocGenError::DocumentNotFound { id } if id == "nope"));
    }

    #[test]
    fn sync_wrapper_runs_outside_a_runtime() {
        let file = export_sync("Plain text.", None, ExportFormat::Html, &text_only()).unwrap();
        assert_eq!(file.format, ExportFormat::Html);
    }
}
