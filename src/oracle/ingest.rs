//! Text extraction from uploaded documents.
//!
//! [`FileExtractor`] reads PDF (via pdfium), DOCX (via zip + quick-xml) and
//! UTF-8 text. Every format ends in the same [`ExtractedDocument`]: plain
//! text with paragraph breaks kept, a minimal escaped HTML rendition and
//! [`DocumentMetadata`] (title, author, headings, word count, page count).
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and the zip reader is
//! synchronous; both run on the blocking pool so the async workers never
//! stall on a large upload.

use crate::error::DocGenError;
use crate::model::{DocumentMetadata, SectionEntry};
use crate::oracle::input::{sniff_format, InputFormat};
use crate::oracle::{ExtractedDocument, TextExtractor};
use crate::pipeline::html::escape_html;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Title used when no line qualifies.
pub const UNTITLED: &str = "Untitled Document";

/// Extracts PDF, DOCX and plain-text files from disk.
#[derive(Debug, Default, Clone)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for FileExtractor {
    fn extract_text<'a>(
        &'a self,
        path: &'a Path,
        mime: &'a str,
    ) -> BoxFuture<'a, Result<ExtractedDocument, DocGenError>> {
        Box::pin(extract_file(path, mime))
    }
}

/// Extract a file, choosing the reader from `mime` or, when it is empty or
/// unrecognised, from the file's leading bytes.
pub async fn extract_file(path: &Path, mime: &str) -> Result<ExtractedDocument, DocGenError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocGenError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DocGenError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DocGenError::ParseFailure {
            source_name: path.display().to_string(),
            detail: e.to_string(),
        },
    })?;

    let format = format_from_mime(mime)
        .or_else(|| sniff_format(&bytes[..bytes.len().min(512)]))
        .ok_or_else(|| DocGenError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: format!("mime type '{}'", mime),
        })?;
    info!("Extracting {:?} from {}", format, path.display());

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match format {
        InputFormat::Pdf => {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || extract_pdf_blocking(&owned))
                .await
                .map_err(|e| DocGenError::Internal(format!("Extraction task panicked: {}", e)))?
        }
        InputFormat::Docx => {
            tokio::task::spawn_blocking(move || extract_docx(&bytes, &source_name))
                .await
                .map_err(|e| DocGenError::Internal(format!("Extraction task panicked: {}", e)))?
        }
        InputFormat::Text => {
            let text = String::from_utf8(bytes).map_err(|e| DocGenError::ParseFailure {
                source_name,
                detail: format!("not valid UTF-8: {}", e),
            })?;
            Ok(from_text(&text, None, None, None))
        }
    }
}

fn format_from_mime(mime: &str) -> Option<InputFormat> {
    let mime = mime.split(';').next().unwrap_or("").trim();
    match mime {
        "application/pdf" => Some(InputFormat::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(InputFormat::Docx)
        }
        "text/plain" | "text/markdown" => Some(InputFormat::Text),
        _ => None,
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library search path.
fn bind_pdfium() -> Result<Pdfium, DocGenError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.is_empty() {
            candidates.push(PathBuf::from(p));
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for path in &candidates {
        if path.exists() {
            match Pdfium::bind_to_library(path) {
                Ok(bindings) => {
                    debug!("Bound pdfium from {}", path.display());
                    return Ok(Pdfium::new(bindings));
                }
                Err(e) => debug!("pdfium at {} unusable: {}", path.display(), e),
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| DocGenError::PdfiumBindingFailed(e.to_string()))
}

fn extract_pdf_blocking(path: &Path) -> Result<ExtractedDocument, DocGenError> {
    let pdfium = bind_pdfium()?;
    let source_name = path.display().to_string();

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| DocGenError::ParseFailure {
            source_name: source_name.clone(),
            detail: format!("{:?}", e),
        })?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };
    let title = get_meta(PdfDocumentMetadataTagType::Title);
    let author = get_meta(PdfDocumentMetadataTagType::Author);

    let pages = document.pages();
    let page_count = pages.len() as usize;
    let mut page_texts = Vec::with_capacity(page_count);
    for (i, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| DocGenError::ParseFailure {
            source_name: source_name.clone(),
            detail: format!("page {}: {:?}", i + 1, e),
        })?;
        page_texts.push(text.all());
    }
    debug!("Extracted text from {} pages", page_count);

    Ok(from_text(&page_texts.join("\n\n"), title, author, Some(page_count)))
}

// ── DOCX ─────────────────────────────────────────────────────────────────

struct DocxParagraph {
    text: String,
    heading_level: Option<u8>,
}

fn extract_docx(bytes: &[u8], source_name: &str) -> Result<ExtractedDocument, DocGenError> {
    let parse_err = |detail: String| DocGenError::ParseFailure {
        source_name: source_name.to_string(),
        detail,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| parse_err(format!("not a DOCX archive: {}", e)))?;

    let xml = read_part(&mut archive, "word/document.xml")
        .ok_or_else(|| parse_err("missing word/document.xml".into()))?;
    let paragraphs = parse_docx_paragraphs(&xml).map_err(parse_err)?;
    let title = read_part(&mut archive, "docProps/core.xml").and_then(|core| core_title(&core));

    let text = paragraphs
        .iter()
        .map(|p| p.text.as_str())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut doc = from_text(&text, title, None, None);

    let styled: Vec<SectionEntry> = paragraphs
        .iter()
        .filter_map(|p| {
            p.heading_level.map(|level| SectionEntry {
                level,
                number: None,
                title: p.text.trim().to_string(),
            })
        })
        .filter(|s| !s.title.is_empty())
        .collect();
    if !styled.is_empty() {
        doc.metadata.sections = styled;
    }
    Ok(doc)
}

fn read_part<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn parse_docx_paragraphs(xml: &str) -> Result<Vec<DocxParagraph>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current: Option<DocxParagraph> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    current = Some(DocxParagraph {
                        text: String::new(),
                        heading_level: None,
                    })
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"pStyle" => {
                    if let (Some(p), Some(val)) = (current.as_mut(), attribute(e, "val")) {
                        p.heading_level = heading_level_of_style(&val);
                    }
                }
                b"br" => {
                    if let Some(p) = current.as_mut() {
                        p.text.push('\n');
                    }
                }
                b"tab" => {
                    if let Some(p) = current.as_mut() {
                        p.text.push('\t');
                    }
                }
                b"p" => out.push(DocxParagraph {
                    text: String::new(),
                    heading_level: None,
                }),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Some(p) = current.as_mut() {
                        let text = e.unescape().map_err(|e| format!("XML text error: {}", e))?;
                        p.text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = current.take() {
                        out.push(p);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// `Heading2` / `heading 2` → 2; `Title` → 1.
fn heading_level_of_style(style: &str) -> Option<u8> {
    let lower = style.to_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let rest = lower.strip_prefix("heading")?;
    rest.trim().parse::<u8>().ok().map(|l| l.clamp(1, 6))
}

fn core_title(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_title = false;
    let mut title = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"title" => in_title = true,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"title" => in_title = false,
            Ok(Event::Text(e)) if in_title => {
                title = e.unescape().ok().map(|t| t.trim().to_string());
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    title.filter(|t| !t.is_empty())
}

// ── Shared text handling ─────────────────────────────────────────────────

static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

/// Collapse runs of spaces inside lines and blank-line runs to one blank
/// line. Line and paragraph boundaries survive.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut blank = false;
    for line in text.lines() {
        let line = RE_SPACES.replace_all(line.trim(), " ");
        if line.is_empty() {
            blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank = false;
    }
    out
}

/// Paragraphs split on blank lines, each escaped and wrapped in `<div>`.
pub fn text_to_html(text: &str) -> String {
    RE_PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<div>{}</div>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First non-empty line shorter than 200 characters.
pub fn detect_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| l.chars().count() < 200)
        .map(str::to_string)
        .unwrap_or_else(|| UNTITLED.to_string())
}

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+([A-Z].*)$").unwrap());
static RE_TITLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][^.!?]+$").unwrap());

/// Heading-like lines: short and either all caps, numbered, or a single
/// clause with no sentence punctuation. Numbered lines are level 1.
pub fn detect_sections(text: &str) -> Vec<SectionEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && l.chars().count() < 100)
        .filter_map(|line| {
            if let Some(caps) = RE_NUMBERED_HEADING.captures(line) {
                return Some(SectionEntry {
                    level: 1,
                    number: Some(caps[1].to_string()),
                    title: caps[2].trim().to_string(),
                });
            }
            let has_letters = line.chars().any(char::is_alphabetic);
            let all_caps = has_letters && line == line.to_uppercase();
            (all_caps || RE_TITLE_LINE.is_match(line)).then(|| SectionEntry {
                level: 2,
                number: None,
                title: line.to_string(),
            })
        })
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Assemble an [`ExtractedDocument`] from raw text.
fn from_text(
    raw: &str,
    title: Option<String>,
    author: Option<String>,
    page_count: Option<usize>,
) -> ExtractedDocument {
    let text = clean_text(raw);
    let metadata = DocumentMetadata {
        title: title.unwrap_or_else(|| detect_title(&text)),
        author,
        sections: detect_sections(&text),
        word_count: word_count(&text),
        page_count,
    };
    ExtractedDocument {
        html: text_to_html(&text),
        text,
        metadata,
    }
}
