//! CLI binary for researchaid-docgen.
//!
//! A thin shim over the library crate: flags map to `DocGenConfig`, each
//! subcommand calls one library entry point and prints or writes the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use researchaid_docgen::oracle::ingest::FileExtractor;
use researchaid_docgen::oracle::input::{resolve_input, InputFormat};
use researchaid_docgen::pipeline::build::outline;
use researchaid_docgen::{
    build_document, export, export_to_file, CitationStyle, DocGenConfig, DocumentKind, ExportFormat,
    GeneratedReport, GenerationProgressCallback, PageSize, PdfEngineKind, ProgressCallback,
    ResearchAssistant, TextExtractor,
};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Progress ─────────────────────────────────────────────────────────────

/// Spinner that narrates generation parts and PDF engine attempts.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Working");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl GenerationProgressCallback for CliProgress {
    fn on_part_start(&self, part: usize, total: usize) {
        self.bar.set_prefix("Generating");
        self.bar.set_message(format!("part {part}/{total}"));
    }

    fn on_part_complete(&self, part: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Part {part}/{total}  {}",
            green("✓"),
            dim(&format!("{chars} chars"))
        ));
    }

    fn on_engine_attempt(&self, engine: &str) {
        self.bar.set_prefix("Rendering");
        self.bar.set_message(engine.to_string());
    }

    fn on_engine_failed(&self, engine: &str, error: &str, falling_back: bool) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        let next = if falling_back { ", trying next engine" } else { "" };
        self.bar
            .println(format!("  {} {engine}: {msg}{}", yellow("⚠"), dim(next)));
    }

    fn on_engine_success(&self, engine: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} {engine}  {}",
            green("✓"),
            dim(&format!("{bytes} bytes"))
        ));
    }
}

// ── Arguments ────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Format a generated report as PDF
  researchaid render report.txt -o report.pdf

  # Same text as DOCX, forcing the generic report layout
  researchaid render report.txt -o report.docx --kind generic-report

  # Extract text and metadata from an uploaded paper
  researchaid ingest paper.pdf --json

  # Summarise a paper and save the summary as PDF
  researchaid generate summary --input paper.pdf -o summary.pdf

  # Research report, streamed to the terminal
  researchaid generate report --topic "Soil carbon sequestration" --words 1500 --stream

  # Three-part assignment response from a brief
  researchaid generate assignment --input brief.docx -o response.docx

PDF ENGINES:
  chromium      headless chromium / google-chrome (--print-to-pdf)
  wkhtmltopdf   used when chromium lacks native libraries
  text-only     in-process fallback, always available

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium, for PDF ingestion
  RUST_LOG                Log filter (overrides --verbose/--quiet)
"#;

/// Format, generate and export academic documents.
#[derive(Parser, Debug)]
#[command(
    name = "researchaid",
    version,
    about = "Format, generate and export academic documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// LLM model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Override every operation's temperature (0.0–2.0).
    #[arg(long, global = true, env = "RESEARCHAID_TEMPERATURE")]
    temperature: Option<f32>,

    /// Per-call oracle timeout in seconds.
    #[arg(long, global = true, env = "RESEARCHAID_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Paper size for DOCX and PDF output.
    #[arg(long, global = true, env = "RESEARCHAID_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Page margin in millimetres (5–60).
    #[arg(long, global = true, env = "RESEARCHAID_MARGIN_MM", default_value_t = 25)]
    margin_mm: u32,

    /// PDF engines to try, in order.
    #[arg(long, global = true, env = "RESEARCHAID_ENGINES", value_enum, value_delimiter = ',',
          default_value = "chromium,wkhtmltopdf,text-only")]
    engines: Vec<EngineArg>,

    /// Chromium executable (default: search PATH).
    #[arg(long, global = true, env = "RESEARCHAID_CHROMIUM")]
    chromium: Option<PathBuf>,

    /// wkhtmltopdf executable (default: search PATH).
    #[arg(long, global = true, env = "RESEARCHAID_WKHTMLTOPDF")]
    wkhtmltopdf: Option<PathBuf>,

    /// Directory with a TrueType font for the text-only PDF engine.
    #[arg(long, global = true, env = "RESEARCHAID_FONT_DIR")]
    font_dir: Option<PathBuf>,

    /// Seconds allowed for one browser render.
    #[arg(long, global = true, env = "RESEARCHAID_RENDER_TIMEOUT", default_value_t = 120)]
    render_timeout: u64,

    /// Move to the next PDF engine on any primary failure.
    #[arg(long, global = true, env = "RESEARCHAID_FALLBACK_ANY")]
    fallback_on_any_error: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "RESEARCHAID_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "RESEARCHAID_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RESEARCHAID_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RESEARCHAID_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify text and export it as PDF, DOCX or HTML.
    Render {
        /// Text/markdown file, PDF, DOCX, URL, or `-` for stdin.
        input: String,

        /// Output file. The format follows the extension unless --format is given.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Skip kind detection.
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Extract text and metadata from a PDF, DOCX or text file.
    Ingest {
        input: String,

        /// Print the full extraction as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the detected kind and section outline of a text.
    Sections {
        input: String,
    },

    /// Generate text with the research assistant.
    Generate {
        #[arg(value_enum)]
        operation: OperationArg,

        /// Paper, brief or query file (PDF, DOCX, text, URL or `-`).
        #[arg(short, long)]
        input: Option<String>,

        /// Topic or query text given inline.
        #[arg(short, long)]
        topic: Option<String>,

        /// Research field for dissertation outlines.
        #[arg(long)]
        field: Option<String>,

        /// Target length for research reports (500–5000).
        #[arg(long, env = "RESEARCHAID_REPORT_WORDS")]
        words: Option<usize>,

        /// Citation style: APA, MLA, Harvard, Chicago.
        #[arg(long, default_value = "APA")]
        style: String,

        /// Paper information for citations, as JSON.
        #[arg(long)]
        info: Option<String>,

        /// Stream the report to stdout as it is written.
        #[arg(long)]
        stream: bool,

        /// Export the generated text to this file (pdf, docx or html).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the structured result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Chromium,
    Wkhtmltopdf,
    TextOnly,
}

impl From<EngineArg> for PdfEngineKind {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Chromium => PdfEngineKind::Chromium,
            EngineArg::Wkhtmltopdf => PdfEngineKind::WebKit,
            EngineArg::TextOnly => PdfEngineKind::TextOnly,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Docx,
    Html,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Docx => ExportFormat::Docx,
            FormatArg::Html => ExportFormat::Html,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Summary,
    Critique,
    ResearchQuestions,
    DissertationOutline,
    GenericReport,
}

impl From<KindArg> for DocumentKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Summary => DocumentKind::Summary,
            KindArg::Critique => DocumentKind::Critique,
            KindArg::ResearchQuestions => DocumentKind::ResearchQuestions,
            KindArg::DissertationOutline => DocumentKind::DissertationOutline,
            KindArg::GenericReport => DocumentKind::GenericReport,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OperationArg {
    Summary,
    Questions,
    Critique,
    Citation,
    Outline,
    Report,
    Assignment,
}

impl OperationArg {
    /// Layout used when exporting the operation's output.
    fn kind(self) -> Option<DocumentKind> {
        match self {
            OperationArg::Summary => Some(DocumentKind::Summary),
            OperationArg::Questions => Some(DocumentKind::ResearchQuestions),
            OperationArg::Critique => Some(DocumentKind::Critique),
            OperationArg::Outline => Some(DocumentKind::DissertationOutline),
            OperationArg::Report | OperationArg::Assignment => Some(DocumentKind::GenericReport),
            OperationArg::Citation => None,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let g = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !g.quiet && !g.no_progress;
    let filter = if g.verbose {
        "debug"
    } else if g.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgress::new);
    let config = build_config(g, progress.clone().map(|p| p as ProgressCallback))?;

    let result = run(cli.command, &config, g.quiet).await;
    if let Some(p) = &progress {
        p.finish();
    }
    result
}

async fn run(command: Command, config: &DocGenConfig, quiet: bool) -> Result<()> {
    match command {
        Command::Render {
            input,
            output,
            format,
            kind,
        } => {
            let text = read_input_text(&input, config).await?;
            render_text(&text, kind.map(Into::into), output.as_deref(), format.map(Into::into), config, quiet).await
        }

        Command::Ingest { input, json } => {
            let resolved = resolve_input(&input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to open {input}"))?;
            let doc = FileExtractor::new()
                .extract_text(resolved.path(), resolved.format().mime())
                .await
                .context("Failed to extract text")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&doc).context("Failed to serialise extraction")?);
            } else {
                let m = &doc.metadata;
                println!("Title:     {}", m.title);
                if let Some(ref a) = m.author {
                    println!("Author:    {}", a);
                }
                println!("Words:     {}", m.word_count);
                if let Some(p) = m.page_count {
                    println!("Pages:     {}", p);
                }
                for s in &m.sections {
                    println!("  {}{}", "  ".repeat(s.level.saturating_sub(1) as usize), section_label(s));
                }
            }
            Ok(())
        }

        Command::Sections { input } => {
            let text = read_input_text(&input, config).await?;
            let report = build_document(&text, &config.thresholds);
            println!("Kind: {}", bold(&report.kind.to_string()));
            for s in outline(&report.blocks) {
                println!("{}{}", "  ".repeat(s.level.saturating_sub(1) as usize), section_label(&s));
            }
            if !report.degraded.is_empty() {
                eprintln!("{} {} lines kept as plain paragraphs", yellow("⚠"), report.degraded.len());
            }
            Ok(())
        }

        Command::Generate {
            operation,
            input,
            topic,
            field,
            words,
            style,
            info,
            stream,
            output,
            json,
        } => {
            let assistant = ResearchAssistant::from_config(config.clone()).context("No LLM provider available")?;
            let text = match &input {
                Some(i) => Some(read_input_text(i, config).await?),
                None => None,
            };
            let source = text.as_deref().or(topic.as_deref()).unwrap_or_default();

            let (generated, value) = match operation {
                OperationArg::Summary => {
                    let r = assistant.summarize_paper(source).await?;
                    (r.summary.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Questions => {
                    let r = assistant.research_questions(text.as_deref(), topic.as_deref()).await?;
                    (r.questions.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Critique => {
                    let r = assistant.critique_arguments(source).await?;
                    (r.critique.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Citation => {
                    let info = match info {
                        Some(raw) => serde_json::from_str(&raw).context("--info must be JSON")?,
                        None => serde_json::Value::String(source.to_string()),
                    };
                    let style: CitationStyle = style.parse()?;
                    let r = assistant.citation(info, style).await?;
                    (r.citation.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Outline => {
                    let r = assistant.dissertation_outline(source, field.as_deref()).await?;
                    (r.outline.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Report if stream => {
                    let r = stream_report(&assistant, source, words).await?;
                    (r.response.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Report => {
                    let r = assistant.research_report(source, words).await?;
                    (r.response.clone(), serde_json::to_value(&r)?)
                }
                OperationArg::Assignment => {
                    let r = assistant.assignment_response(source).await?;
                    (r.response.clone(), serde_json::to_value(&r)?)
                }
            };

            if let Some(path) = output {
                render_text(&generated, operation.kind(), Some(&path), None, config, quiet).await?;
            } else if json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if !(stream && operation == OperationArg::Report) {
                print!("{generated}");
                io::stdout().flush().ok();
            }
            Ok(())
        }
    }
}

/// Print chunks as they arrive and return the cleaned report.
async fn stream_report(assistant: &ResearchAssistant, query: &str, words: Option<usize>) -> Result<GeneratedReport> {
    let mut stream = assistant.stream_research_report(query, words).await?;
    let mut text = String::new();
    let stdout = io::stdout();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let mut handle = stdout.lock();
        handle.write_all(chunk.as_bytes()).context("Failed to write to stdout")?;
        handle.flush().ok();
        text.push_str(&chunk);
    }
    println!();
    Ok(assistant.finish_stream(&text))
}

/// Export `text`, or print HTML to stdout when no output path is given.
async fn render_text(
    text: &str,
    kind: Option<DocumentKind>,
    output: Option<&Path>,
    format: Option<ExportFormat>,
    config: &DocGenConfig,
    quiet: bool,
) -> Result<()> {
    match output {
        Some(path) => {
            let format = format
                .or_else(|| ExportFormat::from_path(path))
                .unwrap_or(ExportFormat::Pdf);
            let file = export_to_file(text, kind, format, path, config)
                .await
                .with_context(|| format!("Failed to export {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{}  {} ({})  {}  →  {}",
                    green("✔"),
                    file.format,
                    file.kind,
                    dim(&format!("{} bytes", file.bytes.len())),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let format = format.unwrap_or(ExportFormat::Html);
            let file = export(text, kind, format, config).await.context("Export failed")?;
            io::stdout()
                .lock()
                .write_all(&file.bytes)
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Read text from stdin, a text file, or a PDF/DOCX file or URL.
async fn read_input_text(input: &str, config: &DocGenConfig) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
        return Ok(buf);
    }
    let resolved = resolve_input(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to open {input}"))?;
    // Text is classified as written; the extractor would reflow it.
    if resolved.format() == InputFormat::Text {
        return tokio::fs::read_to_string(resolved.path())
            .await
            .with_context(|| format!("Failed to read {input}"));
    }
    let doc = FileExtractor::new()
        .extract_text(resolved.path(), resolved.format().mime())
        .await
        .with_context(|| format!("Failed to read {input}"))?;
    Ok(doc.text)
}

fn section_label(s: &researchaid_docgen::SectionEntry) -> String {
    match &s.number {
        Some(n) => format!("{n} {}", s.title),
        None => s.title.clone(),
    }
}

/// Map global flags to `DocGenConfig`.
fn build_config(g: &GlobalArgs, progress: Option<ProgressCallback>) -> Result<DocGenConfig> {
    let mut builder = DocGenConfig::builder()
        .page_size(g.page_size.into())
        .margin_mm(g.margin_mm)
        .engines(g.engines.iter().copied().map(Into::into).collect())
        .render_timeout_secs(g.render_timeout)
        .fallback_on_any_error(g.fallback_on_any_error)
        .download_timeout_secs(g.download_timeout);

    if let Some(ref m) = g.model {
        builder = builder.model(m);
    }
    if let Some(ref p) = g.provider {
        builder = builder.provider_name(p);
    }
    if let Some(t) = g.temperature {
        builder = builder.temperature(t);
    }
    if let Some(secs) = g.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref p) = g.chromium {
        builder = builder.chromium_path(p);
    }
    if let Some(ref p) = g.wkhtmltopdf {
        builder = builder.wkhtmltopdf_path(p);
    }
    if let Some(ref p) = g.font_dir {
        builder = builder.font_dir(p);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
