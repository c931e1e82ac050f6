//! Document model: the typed intermediate form shared by every stage.
//!
//! Raw text is classified into [`StructuredBlock`]s, each wrapped in a
//! [`Block`] together with its resolved [`BlockStyle`]. Renderers only ever
//! read these types; none of them re-inspects the source text.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

// ── Document kind ────────────────────────────────────────────────────────

/// The shape of a generated document, detected once per document.
///
/// Kind selects the rule set the classifier applies; it is never
/// re-evaluated mid-document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Short, unstructured prose.
    Summary,
    /// Labelled critique sections (`**Strengths:**`, …).
    Critique,
    /// A numbered list of research questions.
    ResearchQuestions,
    /// Chapters and dotted subsections of a dissertation plan.
    DissertationOutline,
    /// Everything else: numbered sections, references, flowcharts.
    GenericReport,
}

impl DocumentKind {
    /// Title inserted when the source text carries none.
    pub fn default_title(self) -> Option<&'static str> {
        match self {
            DocumentKind::Summary => Some("Project Summary"),
            DocumentKind::Critique => Some("Argument Critique"),
            DocumentKind::ResearchQuestions => Some("Research Questions"),
            DocumentKind::DissertationOutline => Some("Dissertation Outline"),
            DocumentKind::GenericReport => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Summary => "summary",
            DocumentKind::Critique => "critique",
            DocumentKind::ResearchQuestions => "research-questions",
            DocumentKind::DissertationOutline => "dissertation-outline",
            DocumentKind::GenericReport => "generic-report",
        })
    }
}

// ── Dotted numbers ───────────────────────────────────────────────────────

/// A section number such as `2`, `2.1` or `6.3.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedNumber(Vec<u32>);

impl DottedNumber {
    /// Parse `"2.1.3"` (a trailing dot is tolerated). Returns None for
    /// empty components or non-digits.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_end_matches('.');
        if s.is_empty() {
            return None;
        }
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self(parts))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Heading level implied by the number: component count, capped at 4.
    pub fn level(&self) -> u8 {
        self.0.len().clamp(1, 4) as u8
    }

    /// First component (the chapter).
    pub fn top(&self) -> u32 {
        self.0.first().copied().unwrap_or(0)
    }
}

/// Visible heading text: `1. Introduction`, `2.1 Background`, or the bare
/// text when unnumbered.
pub fn heading_text(number: Option<&DottedNumber>, text: &str) -> String {
    match number {
        Some(n) if n.depth() == 1 => format!("{n}. {text}"),
        Some(n) => format!("{n} {text}"),
        None => text.to_string(),
    }
}

impl From<u32> for DottedNumber {
    fn from(n: u32) -> Self {
        Self(vec![n])
    }
}

impl FromStr for DottedNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a dotted number: {s:?}"))
    }
}

impl fmt::Display for DottedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

impl Serialize for DottedNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DottedNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Byte range into an owning string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// The canonical intermediate form of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredBlock {
    /// Document title; at most one, always first.
    Title { text: String },
    /// Abstract text; at most one, directly after the title.
    Abstract { text: String },
    /// Section heading. `level` equals `number.level()` when a number is present.
    Heading {
        number: Option<DottedNumber>,
        level: u8,
        text: String,
    },
    /// Plain prose. Never bold.
    Paragraph { text: String },
    /// Bullet or numbered item. `ordered` iff `number` is present; `label`
    /// is the bold lead-in of a `Label: description` line.
    ListItem {
        ordered: bool,
        number: Option<u32>,
        label: Option<String>,
        text: String,
    },
    /// Bibliography entry. `raw` is display text (no URL, no emphasis
    /// syntax); `title` marks the span of `raw` rendered in italics.
    Reference {
        raw: String,
        title: Option<Span>,
        url: Option<String>,
    },
    /// Component labels of a top-to-bottom diagram, in order.
    Flowchart { nodes: Vec<String> },
    /// Preformatted text.
    Code { text: String },
}

impl StructuredBlock {
    /// Numbered heading with the level derived from the number.
    pub fn numbered_heading(number: DottedNumber, text: impl Into<String>) -> Self {
        StructuredBlock::Heading {
            level: number.level(),
            number: Some(number),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        StructuredBlock::Paragraph { text: text.into() }
    }

    /// Short tag used in logs.
    pub fn tag(&self) -> &'static str {
        match self {
            StructuredBlock::Title { .. } => "title",
            StructuredBlock::Abstract { .. } => "abstract",
            StructuredBlock::Heading { .. } => "heading",
            StructuredBlock::Paragraph { .. } => "paragraph",
            StructuredBlock::ListItem { .. } => "list_item",
            StructuredBlock::Reference { .. } => "reference",
            StructuredBlock::Flowchart { .. } => "flowchart",
            StructuredBlock::Code { .. } => "code",
        }
    }

    /// The italic title of a reference, if any.
    pub fn reference_title(&self) -> Option<&str> {
        match self {
            StructuredBlock::Reference {
                raw,
                title: Some(span),
                ..
            } => raw.get(span.range()),
            _ => None,
        }
    }
}

/// Font family of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontFamily {
    Serif,
    Monospace,
}

impl FontFamily {
    /// Face name used by both the HTML and DOCX renderers.
    pub fn face(self) -> &'static str {
        match self {
            FontFamily::Serif => "Times New Roman",
            FontFamily::Monospace => "Courier New",
        }
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    Justify,
}

/// Presentation values resolved once by the builder.
///
/// All lengths are whole points; renderers convert mechanically (CSS `pt`,
/// DOCX half-points and twips).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStyle {
    pub font: FontFamily,
    pub size_pt: u32,
    /// Size of the separate label line (the "Abstract" caption).
    pub label_size_pt: Option<u32>,
    /// Whole-block bold. List labels and markers are bold regardless.
    pub bold: bool,
    pub align: Alignment,
    pub space_before_pt: u32,
    pub space_after_pt: u32,
    pub indent_pt: u32,
    pub hanging_pt: u32,
    /// Background fill as hex RGB without `#`.
    pub background: Option<String>,
    /// Left border colour as hex RGB without `#`.
    pub border: Option<String>,
}

/// A built block: content plus its presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub content: StructuredBlock,
    pub style: BlockStyle,
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// A heading found in a document, used for outlines and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub level: u8,
    pub number: Option<String>,
    pub title: String,
}

/// Metadata reported by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: Option<String>,
    pub sections: Vec<SectionEntry>,
    pub word_count: usize,
    /// Only known for paginated sources (PDF).
    pub page_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_number_parse_and_display() {
        let n = DottedNumber::parse("2.1.3").unwrap();
        assert_eq!(n.components(), &[2, 1, 3]);
        assert_eq!(n.to_string(), "2.1.3");
        assert_eq!(n.level(), 3);
        assert_eq!(n.top(), 2);
        assert_eq!(DottedNumber::parse("4.").unwrap().to_string(), "4");
    }

    #[test]
    fn heading_text_formats_by_depth() {
        assert_eq!(heading_text(Some(&DottedNumber::from(1)), "Intro"), "1. Intro");
        let sub = DottedNumber::parse("2.1").unwrap();
        assert_eq!(heading_text(Some(&sub), "Background"), "2.1 Background");
        assert_eq!(heading_text(None, "Strengths"), "Strengths");
    }

    #[test]
    fn dotted_number_level_caps_at_four() {
        assert_eq!(DottedNumber::parse("1.2.3.4.5").unwrap().level(), 4);
    }

    #[test]
    fn dotted_number_rejects_garbage() {
        assert!(DottedNumber::parse("").is_none());
        assert!(DottedNumber::parse("1..2").is_none());
        assert!(DottedNumber::parse("a.1").is_none());
    }

    #[test]
    fn dotted_number_serialises_as_string() {
        let n = DottedNumber::parse("6.1").unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"6.1\"");
        let back: DottedNumber = serde_json::from_str("\"6.1\"").unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn block_json_is_tagged() {
        let b = StructuredBlock::numbered_heading(DottedNumber::from(8), "Evaluation");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "heading");
        assert_eq!(json["number"], "8");
        assert_eq!(json["level"], 1);
    }

    #[test]
    fn reference_title_slices_raw() {
        let b = StructuredBlock::Reference {
            raw: "Smith, J., 2020. Climate Effects. Journal X.".into(),
            title: Some(Span { start: 17, end: 32 }),
            url: None,
        };
        assert_eq!(b.reference_title(), Some("Climate Effects"));
    }

    #[test]
    fn kind_default_titles() {
        assert_eq!(DocumentKind::Critique.default_title(), Some("Argument Critique"));
        assert_eq!(DocumentKind::GenericReport.default_title(), None);
    }
}
