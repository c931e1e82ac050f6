//! PDF rendering with a prioritised engine chain.
//!
//! ```text
//!  html (+ source text)
//!        │
//!        ▼
//!  ┌───────────┐  native-library failure  ┌─────────────┐  any failure  ┌───────────┐
//!  │ chromium  │ ───────────────────────▶ │ wkhtmltopdf │ ────────────▶ │ text-only │
//!  └───────────┘                          └─────────────┘               └───────────┘
//!        │ other failure
//!        ▼
//!  RenderFailed
//! ```
//!
//! The order is configurable through [`DocGenConfig::engines`]. Only the
//! first engine is strict: it hands over to the next one when its failure
//! looks like a missing native library (or the executable is absent), and
//! otherwise the error propagates unless
//! [`DocGenConfig::fallback_on_any_error`] is set. Later engines always
//! advance on failure.

pub mod browser;
pub mod text_only;

use crate::config::{DocGenConfig, KindThresholds, PdfEngineKind};
use crate::error::DocGenError;
use crate::model::Block;
use crate::pipeline::build::build_document;
use crate::pipeline::html::html_to_text;
use crate::progress::ProgressCallback;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use browser::{open_browser_sessions, ChromiumEngine, WebKitEngine};
pub use text_only::render_blocks;

// ── Engine errors ────────────────────────────────────────────────────────

/// Why one engine attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("no TrueType font found in {searched:?}")]
    FontMissing { searched: Vec<PathBuf> },

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Output(String),
}

impl EngineError {
    /// True when the failure points at the host environment rather than the
    /// document: a missing shared library, executable or font.
    pub fn is_missing_native_library(&self) -> bool {
        match self {
            EngineError::NotFound { .. } | EngineError::FontMissing { .. } => true,
            EngineError::Spawn { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
                    || is_missing_native_library(&source.to_string())
            }
            EngineError::Exited { stderr, .. } => is_missing_native_library(stderr),
            EngineError::Output(msg) | EngineError::Io(msg) => is_missing_native_library(msg),
            EngineError::TimedOut { .. } => false,
        }
    }
}

/// Does `message` carry a missing-native-library signature?
pub fn is_missing_native_library(message: &str) -> bool {
    const SIGNATURES: &[&str] = &[
        "libnss3.so",
        "shared libraries",
        "cannot open shared object file",
    ];
    SIGNATURES.iter().any(|s| message.contains(s))
}

// ── Engines ──────────────────────────────────────────────────────────────

/// What every engine receives.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub html: String,
    /// Blocks already built by the caller, reused by the text-only engine.
    pub blocks: Option<Vec<Block>>,
    /// Markdown-like source text the HTML was rendered from.
    pub source: Option<String>,
    pub thresholds: KindThresholds,
}

impl RenderRequest {
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn with_thresholds(mut self, thresholds: KindThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Blocks for engines that lay text out themselves. Falls back to
    /// rebuilding from the source text, or from the HTML's visible text.
    /// A table of contents is dropped by the classifier.
    pub fn resolve_blocks(&self) -> Vec<Block> {
        if let Some(blocks) = &self.blocks {
            return blocks.clone();
        }
        let source = match &self.source {
            Some(s) => s.clone(),
            None => html_to_text(&self.html),
        };
        build_document(&source, &self.thresholds).blocks
    }
}

/// One way of turning a [`RenderRequest`] into PDF bytes.
pub trait PdfEngine: Send + Sync {
    fn name(&self) -> &str;

    fn attempt<'a>(&'a self, request: &'a RenderRequest) -> BoxFuture<'a, Result<Vec<u8>, EngineError>>;
}

/// In-process engine. Needs nothing from the host but a TrueType font.
#[derive(Debug, Clone, Default)]
pub struct TextOnlyEngine {
    /// Searched before the system font directories.
    pub font_dir: Option<PathBuf>,
}

impl TextOnlyEngine {
    pub fn from_config(config: &DocGenConfig) -> Self {
        Self {
            font_dir: config.font_dir.clone(),
        }
    }
}

impl PdfEngine for TextOnlyEngine {
    fn name(&self) -> &str {
        "text-only"
    }

    fn attempt<'a>(&'a self, request: &'a RenderRequest) -> BoxFuture<'a, Result<Vec<u8>, EngineError>> {
        Box::pin(async move {
            let blocks = request.resolve_blocks();
            let font_dir = self.font_dir.clone();
            tokio::task::spawn_blocking(move || render_blocks(&blocks, font_dir.as_deref()))
                .await
                .map_err(|e| EngineError::Io(format!("text-only layout task panicked: {}", e)))?
        })
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// An ordered list of engines and the rule for moving between them.
pub struct RenderPipeline {
    engines: Vec<Arc<dyn PdfEngine>>,
    fallback_on_any_error: bool,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("engines", &self.engines.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("fallback_on_any_error", &self.fallback_on_any_error)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn GenerationProgressCallback>"))
            .finish()
    }
}

impl RenderPipeline {
    pub fn new(engines: Vec<Arc<dyn PdfEngine>>) -> Self {
        Self {
            engines,
            fallback_on_any_error: false,
            progress: None,
        }
    }

    pub fn fallback_on_any_error(mut self, v: bool) -> Self {
        self.fallback_on_any_error = v;
        self
    }

    pub fn progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn from_config(config: &DocGenConfig) -> Self {
        let engines = config
            .engines
            .iter()
            .map(|kind| -> Arc<dyn PdfEngine> {
                match kind {
                    PdfEngineKind::Chromium => Arc::new(ChromiumEngine::from_config(config)),
                    PdfEngineKind::WebKit => Arc::new(WebKitEngine::from_config(config)),
                    PdfEngineKind::TextOnly => Arc::new(TextOnlyEngine::from_config(config)),
                }
            })
            .collect();
        Self {
            engines,
            fallback_on_any_error: config.fallback_on_any_error,
            progress: config.progress_callback.clone(),
        }
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// Try each engine in order until one produces a PDF.
    pub async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, DocGenError> {
        let mut attempts = Vec::new();
        let count = self.engines.len();

        for (i, engine) in self.engines.iter().enumerate() {
            let name = engine.name();
            if let Some(cb) = &self.progress {
                cb.on_engine_attempt(name);
            }
            debug!("PDF render: trying {} ({}/{})", name, i + 1, count);

            match engine.attempt(request).await {
                Ok(bytes) => {
                    info!("PDF render: {} produced {} bytes", name, bytes.len());
                    if let Some(cb) = &self.progress {
                        cb.on_engine_success(name, bytes.len());
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    let detail = e.to_string();
                    let native = e.is_missing_native_library();
                    let advance = i > 0 || native || self.fallback_on_any_error;
                    let falling_back = advance && i + 1 < count;
                    if let Some(cb) = &self.progress {
                        cb.on_engine_failed(name, &detail, falling_back);
                    }
                    if !advance {
                        warn!("PDF render: {} failed: {}", name, detail);
                        return Err(DocGenError::RenderFailed {
                            engine: name.to_string(),
                            detail,
                        });
                    }
                    if native {
                        warn!("PDF render: {} unavailable on this host: {}", name, detail);
                    } else {
                        warn!("PDF render: {} failed: {}", name, detail);
                    }
                    attempts.push(format!("{}: {}", name, detail));
                }
            }
        }

        Err(DocGenError::RenderUnavailable { attempts })
    }
}

/// Render HTML to PDF with the configured engine chain.
pub async fn render_pdf(html: &str, config: &DocGenConfig) -> Result<Vec<u8>, DocGenError> {
    let request = RenderRequest::from_html(html).with_thresholds(config.thresholds);
    RenderPipeline::from_config(config).render(&request).await
}

/// Like [`render_pdf`], but the text-only engine rebuilds its layout from
/// `source` instead of the HTML's visible text.
pub async fn render_pdf_with_source(
    html: &str,
    source: &str,
    config: &DocGenConfig,
) -> Result<Vec<u8>, DocGenError> {
    let request = RenderRequest::from_html(html)
        .with_source(source)
        .with_thresholds(config.thresholds);
    RenderPipeline::from_config(config).render(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DottedNumber, StructuredBlock};
    use crate::progress::GenerationProgressCallback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        name: &'static str,
        result: fn() -> Result<Vec<u8>, EngineError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, result: fn() -> Result<Vec<u8>, EngineError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PdfEngine for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn attempt<'a>(&'a self, _: &'a RenderRequest) -> BoxFuture<'a, Result<Vec<u8>, EngineError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let r = (self.result)();
            Box::pin(async move { r })
        }
    }

    fn missing_lib() -> Result<Vec<u8>, EngineError> {
        Err(EngineError::Exited {
            code: Some(127),
            stderr: "error while loading shared libraries: libnss3.so: cannot open shared object file".into(),
        })
    }

    fn crashed() -> Result<Vec<u8>, EngineError> {
        Err(EngineError::Exited {
            code: Some(1),
            stderr: "renderer crashed".into(),
        })
    }

    fn ok() -> Result<Vec<u8>, EngineError> {
        Ok(b"%PDF-1.4 ok".to_vec())
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl GenerationProgressCallback for Recorder {
        fn on_engine_attempt(&self, engine: &str) {
            self.0.lock().unwrap().push(format!("try {engine}"));
        }
        fn on_engine_failed(&self, engine: &str, _: &str, falling_back: bool) {
            self.0.lock().unwrap().push(format!("fail {engine} {falling_back}"));
        }
        fn on_engine_success(&self, engine: &str, _: usize) {
            self.0.lock().unwrap().push(format!("ok {engine}"));
        }
    }

    #[tokio::test]
    async fn native_failure_falls_through_to_text_only() {
        let primary = Scripted::new("chromium", missing_lib);
        let secondary = Scripted::new("wkhtmltopdf", missing_lib);
        let recorder = Arc::new(Recorder::default());
        let engines: Vec<Arc<dyn PdfEngine>> = vec![primary.clone(), secondary.clone(), Arc::new(TextOnlyEngine::default())];
        let pipeline = RenderPipeline::new(engines).progress(recorder.clone());

        let req = RenderRequest::from_html("<h1>1. Introduction</h1><p>Body text.</p>");
        let pdf = pipeline.render(&req).await.unwrap();

        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "try chromium",
                "fail chromium true",
                "try wkhtmltopdf",
                "fail wkhtmltopdf true",
                "try text-only",
                "ok text-only",
            ]
        );
    }

    #[tokio::test]
    async fn other_primary_failure_propagates() {
        let secondary = Scripted::new("wkhtmltopdf", ok);
        let engines: Vec<Arc<dyn PdfEngine>> = vec![Scripted::new("chromium", crashed), secondary.clone()];
        let pipeline = RenderPipeline::new(engines);
        let err = pipeline.render(&RenderRequest::from_html("<p>x</p>")).await.unwrap_err();
        match err {
            DocGenError::RenderFailed { engine, detail } => {
                assert_eq!(engine, "chromium");
                assert!(detail.contains("renderer crashed"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_on_any_error_advances() {
        let engines: Vec<Arc<dyn PdfEngine>> = vec![Scripted::new("chromium", crashed), Scripted::new("wkhtmltopdf", ok)];
        let pipeline = RenderPipeline::new(engines).fallback_on_any_error(true);
        let pdf = pipeline.render(&RenderRequest::from_html("<p>x</p>")).await.unwrap();
        assert_eq!(pdf, b"%PDF-1.4 ok");
    }

    #[tokio::test]
    async fn secondary_advances_on_any_failure() {
        let engines: Vec<Arc<dyn PdfEngine>> = vec![
            Scripted::new("chromium", missing_lib),
            Scripted::new("wkhtmltopdf", crashed),
            Scripted::new("third", ok),
        ];
        let pipeline = RenderPipeline::new(engines);
        assert!(pipeline.render(&RenderRequest::from_html("")).await.is_ok());
    }

    #[tokio::test]
    async fn all_failing_reports_every_attempt() {
        let engines: Vec<Arc<dyn PdfEngine>> = vec![
            Scripted::new("chromium", missing_lib),
            Scripted::new("wkhtmltopdf", crashed),
        ];
        let pipeline = RenderPipeline::new(engines);
        match pipeline.render(&RenderRequest::from_html("")).await.unwrap_err() {
            DocGenError::RenderUnavailable { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].starts_with("chromium: "));
                assert!(attempts[1].contains("renderer crashed"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn signature_detection() {
        assert!(is_missing_native_library("libnss3.so: cannot open shared object file"));
        assert!(is_missing_native_library("error while loading shared libraries"));
        assert!(!is_missing_native_library("segmentation fault"));
        assert!(EngineError::NotFound { program: "x".into() }.is_missing_native_library());
        assert!(!EngineError::TimedOut { secs: 3 }.is_missing_native_library());
        let spawn = EngineError::Spawn {
            program: "x".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(spawn.is_missing_native_library());
    }

    #[test]
    fn source_text_takes_precedence_over_html() {
        let req = RenderRequest::from_html("<p>From HTML only.</p>").with_source("From the source.");
        let blocks = req.resolve_blocks();
        assert!(blocks
            .iter()
            .any(|b| matches!(&b.content, StructuredBlock::Paragraph { text } if text.contains("source"))));
    }

    #[test]
    fn contents_block_closed_by_a_rule_keeps_the_body() {
        let source = "Table of Contents\n1. Introduction\n2. Methods\n---\n1. Introduction\n\
                      The body text of the introduction.\n2. Methods\nMethod text.";
        let blocks = RenderRequest::from_html("").with_source(source).resolve_blocks();
        let contents: Vec<_> = blocks.into_iter().map(|b| b.content).collect();
        assert_eq!(
            contents,
            vec![
                StructuredBlock::Heading {
                    number: Some(DottedNumber::from(1)),
                    level: 1,
                    text: "Introduction".into(),
                },
                StructuredBlock::Paragraph {
                    text: "The body text of the introduction.".into(),
                },
                StructuredBlock::Heading {
                    number: Some(DottedNumber::from(2)),
                    level: 1,
                    text: "Methods".into(),
                },
                StructuredBlock::Paragraph {
                    text: "Method text.".into(),
                },
            ]
        );
    }

    #[test]
    fn dot_leader_contents_without_a_rule_are_skipped() {
        let source = "Contents\nIntroduction ........ 1\nMethods ........ 4\n\n1. Introduction\nBody.";
        let blocks = RenderRequest::from_html("").with_source(source).resolve_blocks();
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[1].content, StructuredBlock::Paragraph { text } if text == "Body."));
    }
}
