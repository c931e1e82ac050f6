//! # researchaid-docgen
//!
//! Turn loosely formatted, model-generated academic text into consistently
//! styled HTML, DOCX and PDF.
//!
//! ## Why this crate?
//!
//! Language models write reports that are almost structured: numbered
//! headings with stray bold, bulleted chapter names, references with
//! trailing URLs, flowcharts drawn with arrows. Regex passes over such text
//! break on the first surprise. This crate classifies every line against an
//! ordered rule table driven by a small state machine, builds a typed block
//! list, and renders all formats from that single list with one style table,
//! so HTML, DOCX and PDF never disagree.
//!
//! ## Pipeline Overview
//!
//! ```text
//! raw text
//!  │
//!  ├─ 1. Kind      critique / outline / questions / summary / report
//!  ├─ 2. Classify  rule table + state machine, one role per line (lazy)
//!  ├─ 3. Build     blocks with styles from the style table
//!  ├─ 4. Render    HTML, DOCX document model + OOXML package
//!  └─ 5. PDF       chromium → wkhtmltopdf → in-process text-only layout
//! ```
//!
//! Around the engine sit the collaborators in [`oracle`]: a completion
//! oracle for the [`research`] operations, a text extractor for uploaded
//! PDF/DOCX/text files, and a document store for later export.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use researchaid_docgen::{export, DocGenConfig, ExportFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DocGenConfig::default();
//!     let text = "1. Introduction\nThis is the intro text.";
//!     let pdf = export(text, None, ExportFormat::Pdf, &config).await?;
//!     std::fs::write(&pdf.file_name, &pdf.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! Generating text needs a provider. It is auto-detected from
//! `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` / `EDGEQUAKE_LLM_PROVIDER`:
//!
//! ```rust,no_run
//! use researchaid_docgen::{DocGenConfig, ResearchAssistant};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let assistant = ResearchAssistant::from_config(DocGenConfig::default())?;
//! let report = assistant.research_report("Soil carbon sequestration", Some(1500)).await?;
//! println!("{}", report.response);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `researchaid` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! researchaid-docgen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod oracle;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod research;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocGenConfig, DocGenConfigBuilder, KindThresholds, PageSize, PdfEngineKind};
pub use error::{ClassificationDegraded, DocGenError, OracleFailure};
pub use export::{export, export_stored, export_sync, export_to_file, ExportFormat, ExportedFile};
pub use model::{
    Block, BlockStyle, DocumentKind, DocumentMetadata, DottedNumber, SectionEntry, StructuredBlock,
};
pub use oracle::{
    CompletionOracle, CompletionRequest, DocumentStore, ExtractedDocument, StoredDocument,
    TextExtractor,
};
pub use pdf::{render_pdf, render_pdf_with_source};
pub use pipeline::build::{build_document, classify_and_build, BuildReport};
pub use pipeline::container::serialize_document_model;
pub use pipeline::docx::{to_document_model as render_document_model, DocumentTree};
pub use pipeline::html::to_html as render_html;
pub use pipeline::kind::detect_kind;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use research::{CitationStyle, GeneratedReport, ResearchAssistant};
