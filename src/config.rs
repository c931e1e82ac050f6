//! Configuration types for document generation and rendering.
//!
//! Every knob lives in [`DocGenConfig`], built via its
//! [`DocGenConfigBuilder`]. One struct covers page geometry, the PDF engine
//! strategy list, the completion oracle and the kind-detection thresholds so
//! a config can be shared across tasks and logged as a whole.

use crate::error::DocGenError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for generating, classifying and rendering documents.
///
/// Built via [`DocGenConfig::builder()`] or using [`DocGenConfig::default()`].
///
/// # Example
/// ```rust
/// use researchaid_docgen::{DocGenConfig, PageSize, PdfEngineKind};
///
/// let config = DocGenConfig::builder()
///     .page_size(PageSize::Letter)
///     .engines(vec![PdfEngineKind::TextOnly])
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DocGenConfig {
    /// Paper size used by every renderer. Default: [`PageSize::A4`].
    pub page_size: PageSize,

    /// Page margin in millimetres, applied on all four sides. Range: 5–60. Default: 25.
    ///
    /// Applied to the HTML `@page` rule, the wkhtmltopdf margins and the
    /// DOCX section properties. The text-only engine keeps its fixed 70 pt.
    pub margin_mm: u32,

    /// Ordered PDF engine strategy list.
    /// Default: `[Chromium, WebKit, TextOnly]`.
    ///
    /// Each engine is attempted in order. A failure of the first engine only
    /// advances to the next one when it carries a missing-native-library
    /// signature (see [`crate::pdf::is_missing_native_library`]); later
    /// engines advance on any failure.
    pub engines: Vec<PdfEngineKind>,

    /// Explicit chromium/chrome executable. If None, PATH is searched for
    /// `chromium`, `chromium-browser`, `google-chrome`, `google-chrome-stable`.
    pub chromium_path: Option<PathBuf>,

    /// Explicit wkhtmltopdf executable. If None, PATH is searched.
    pub wkhtmltopdf_path: Option<PathBuf>,

    /// Directory holding the TrueType font for the text-only engine.
    /// Searched before the usual system font directories.
    pub font_dir: Option<PathBuf>,

    /// Per-engine render timeout in seconds. Default: 120.
    ///
    /// A browser that exceeds it is killed and the attempt is reported as a
    /// failed attempt like any other.
    pub render_timeout_secs: u64,

    /// Advance past the first engine on any failure, not only on missing
    /// native libraries. Default: false.
    pub fallback_on_any_error: bool,

    /// LLM model identifier, e.g. "gpt-4.1-mini".
    /// If None, uses the provider default (or "gpt-4.1-mini" for named providers).
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Override for every operation's sampling temperature.
    /// If None, each operation uses its own tuned value.
    pub temperature: Option<f32>,

    /// Per-completion timeout in seconds. Default: None (the provider decides).
    pub api_timeout_secs: Option<u64>,

    /// Kind-detection thresholds. Default: 5 000 / 10 000 characters.
    pub thresholds: KindThresholds,

    /// Target length of generated research reports, clamped to 500–5000. Default: 1000.
    pub report_word_count: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives multi-part generation and engine events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DocGenConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin_mm: 25,
            engines: vec![
                PdfEngineKind::Chromium,
                PdfEngineKind::WebKit,
                PdfEngineKind::TextOnly,
            ],
            chromium_path: None,
            wkhtmltopdf_path: None,
            font_dir: None,
            render_timeout_secs: 120,
            fallback_on_any_error: false,
            model: None,
            provider_name: None,
            provider: None,
            temperature: None,
            api_timeout_secs: None,
            thresholds: KindThresholds::default(),
            report_word_count: 1000,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DocGenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocGenConfig")
            .field("page_size", &self.page_size)
            .field("margin_mm", &self.margin_mm)
            .field("engines", &self.engines)
            .field("chromium_path", &self.chromium_path)
            .field("wkhtmltopdf_path", &self.wkhtmltopdf_path)
            .field("font_dir", &self.font_dir)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("fallback_on_any_error", &self.fallback_on_any_error)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("thresholds", &self.thresholds)
            .field("report_word_count", &self.report_word_count)
            .finish()
    }
}

impl DocGenConfig {
    /// Create a new builder for `DocGenConfig`.
    pub fn builder() -> DocGenConfigBuilder {
        DocGenConfigBuilder {
            config: Self::default(),
        }
    }

    /// Margin in PDF points.
    pub fn margin_pt(&self) -> f32 {
        self.margin_mm as f32 * 72.0 / 25.4
    }

    /// Margin in twentieths of a point.
    pub fn margin_twips(&self) -> u32 {
        (self.margin_mm as f32 * 1440.0 / 25.4).round() as u32
    }
}

/// Builder for [`DocGenConfig`].
#[derive(Debug)]
pub struct DocGenConfigBuilder {
    config: DocGenConfig,
}

impl DocGenConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_mm(mut self, mm: u32) -> Self {
        self.config.margin_mm = mm.clamp(5, 60);
        self
    }

    pub fn engines(mut self, engines: Vec<PdfEngineKind>) -> Self {
        self.config.engines = engines;
        self
    }

    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chromium_path = Some(path.into());
        self
    }

    pub fn wkhtmltopdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wkhtmltopdf_path = Some(path.into());
        self
    }

    pub fn font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_dir = Some(path.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn fallback_on_any_error(mut self, v: bool) -> Self {
        self.config.fallback_on_any_error = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn thresholds(mut self, thresholds: KindThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn report_word_count(mut self, words: usize) -> Self {
        self.config.report_word_count = words.clamp(500, 5000);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DocGenConfig, DocGenError> {
        let c = &self.config;
        if c.engines.is_empty() {
            return Err(DocGenError::InvalidConfig(
                "At least one PDF engine is required".into(),
            ));
        }
        if c.render_timeout_secs == 0 {
            return Err(DocGenError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(DocGenError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.thresholds.summary_max_chars == 0 || c.thresholds.questions_max_chars == 0 {
            return Err(DocGenError::InvalidConfig(format!(
                "Kind thresholds must be positive, got {:?}",
                c.thresholds
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size shared by the HTML, DOCX and PDF renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
}

impl PageSize {
    /// Width and height in PDF points.
    pub fn points(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Width and height in twentieths of a point (DOCX section units).
    pub fn twips(self) -> (u32, u32) {
        match self {
            PageSize::A4 => (11906, 16838),
            PageSize::Letter => (12240, 15840),
        }
    }

    /// Name used in CSS `@page { size: … }` and by wkhtmltopdf.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "Letter",
        }
    }
}

/// One entry of the PDF engine strategy list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfEngineKind {
    /// Headless chromium `--print-to-pdf`. Highest fidelity.
    Chromium,
    /// `wkhtmltopdf` (QtWebKit). Full CSS support minus modern layout.
    WebKit,
    /// In-process text drawing. Always available, plain styling.
    TextOnly,
}

impl fmt::Display for PdfEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PdfEngineKind::Chromium => "chromium",
            PdfEngineKind::WebKit => "wkhtmltopdf",
            PdfEngineKind::TextOnly => "text-only",
        })
    }
}

/// Length limits used by document-kind detection.
///
/// Both values are tuned guesses rather than protocol constants: a summary
/// longer than `summary_max_chars` is treated as a structured report, and
/// numbered lists longer than `questions_max_chars` stop looking like a
/// question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindThresholds {
    /// Default: 5000.
    pub summary_max_chars: usize,
    /// Default: 10000.
    pub questions_max_chars: usize,
}

impl Default for KindThresholds {
    fn default() -> Self {
        Self {
            summary_max_chars: 5000,
            questions_max_chars: 10000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = DocGenConfig::default();
        assert_eq!(c.page_size, PageSize::A4);
        assert_eq!(c.margin_mm, 25);
        assert_eq!(c.engines.len(), 3);
        assert_eq!(c.engines[0], PdfEngineKind::Chromium);
        assert_eq!(c.thresholds.summary_max_chars, 5000);
        assert_eq!(c.thresholds.questions_max_chars, 10000);
        assert_eq!(c.report_word_count, 1000);
    }

    #[test]
    fn builder_clamps_values() {
        let c = DocGenConfig::builder()
            .margin_mm(500)
            .report_word_count(20)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.margin_mm, 60);
        assert_eq!(c.report_word_count, 500);
        assert_eq!(c.temperature, Some(2.0));
    }

    #[test]
    fn builder_rejects_empty_engine_list() {
        let err = DocGenConfig::builder().engines(vec![]).build().unwrap_err();
        assert!(matches!(err, DocGenError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeouts() {
        assert!(DocGenConfig::builder().render_timeout_secs(0).build().is_err());
        assert!(DocGenConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn margin_conversions() {
        let c = DocGenConfig::default();
        assert!((c.margin_pt() - 70.87).abs() < 0.01);
        assert_eq!(c.margin_twips(), 1417);
    }

    #[test]
    fn debug_redacts_provider() {
        let dbg = format!("{:?}", DocGenConfig::default());
        assert!(dbg.contains("provider: None"));
    }

    #[test]
    fn engine_kind_display() {
        assert_eq!(PdfEngineKind::WebKit.to_string(), "wkhtmltopdf");
        assert_eq!(PdfEngineKind::TextOnly.to_string(), "text-only");
    }
}
