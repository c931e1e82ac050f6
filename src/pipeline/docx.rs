//! Document-model renderer: blocks to a word-processing paragraph tree.
//!
//! The tree mirrors what an Office Open XML body holds (paragraphs with
//! properties, runs with character formatting) without committing to any
//! XML. [`crate::pipeline::container`] serialises it into a `.docx`
//! package. Sizes are half-points (pt × 2); spacing and indents are twips
//! (pt × 20).

use crate::config::{DocGenConfig, PageSize};
use crate::model::{heading_text, Alignment, Block, BlockStyle, StructuredBlock};
use crate::pipeline::html::EMPTY_PLACEHOLDER;
use crate::pipeline::style::{style_table, LINE_HEIGHT};
use serde::{Deserialize, Serialize};

/// Page size and margins in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl PageGeometry {
    pub fn new(size: PageSize, margin_twips: u32) -> Self {
        let (width, height) = size.twips();
        Self {
            width,
            height,
            margin: margin_twips,
        }
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::from_config(&DocGenConfig::default())
    }
}

impl PageGeometry {
    pub fn from_config(config: &DocGenConfig) -> Self {
        Self::new(config.page_size, config.margin_twips())
    }
}

/// A character run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// May contain `\n`, written as line breaks.
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub size_half_points: u32,
    pub font: String,
}

/// A paragraph with its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Named style (`Title`, `Heading1` … `Heading4`), if any.
    pub style_id: Option<String>,
    /// Outline level for headings, 1-based.
    pub heading_level: Option<u8>,
    pub alignment: Alignment,
    pub spacing_before: u32,
    pub spacing_after: u32,
    /// Line spacing in 240ths of a line.
    pub line: u32,
    pub indent_left: u32,
    pub hanging: u32,
    /// Attached to the bullet list definition.
    pub bullet: bool,
    pub shading: Option<String>,
    pub border_left: Option<String>,
    pub runs: Vec<Run>,
}

/// A complete document: geometry, title for core properties, body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub page: PageGeometry,
    pub title: Option<String>,
    pub paragraphs: Vec<Paragraph>,
}

impl DocumentTree {
    /// Concatenated run text, one line per paragraph.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.runs.iter().map(|r| r.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Twentieths of a point.
pub fn twips(pt: u32) -> u32 {
    pt * 20
}

/// Half-point font size.
pub fn half_points(pt: u32) -> u32 {
    pt * 2
}

fn line_240ths() -> u32 {
    (LINE_HEIGHT * 240.0).round() as u32
}

fn run(style: &BlockStyle, text: impl Into<String>, bold: bool, italic: bool) -> Run {
    Run {
        text: text.into(),
        bold,
        italic,
        size_half_points: half_points(style.size_pt),
        font: style.font.face().to_string(),
    }
}

fn paragraph(style: &BlockStyle, runs: Vec<Run>) -> Paragraph {
    Paragraph {
        style_id: None,
        heading_level: None,
        alignment: style.align,
        spacing_before: twips(style.space_before_pt),
        spacing_after: twips(style.space_after_pt),
        line: line_240ths(),
        indent_left: twips(style.indent_pt + style.hanging_pt),
        hanging: twips(style.hanging_pt),
        bullet: false,
        shading: style.background.clone(),
        border_left: style.border.clone(),
        runs,
    }
}

/// Build the tree with default page geometry.
pub fn to_document_model(blocks: &[Block]) -> DocumentTree {
    to_document_model_with(blocks, PageGeometry::default())
}

/// Build the tree for the given page geometry.
pub fn to_document_model_with(blocks: &[Block], page: PageGeometry) -> DocumentTree {
    let title = blocks.iter().find_map(|b| match &b.content {
        StructuredBlock::Title { text } => Some(text.clone()),
        _ => None,
    });

    let mut paragraphs = Vec::with_capacity(blocks.len());
    if blocks.is_empty() {
        let style = &style_table().paragraph;
        paragraphs.push(paragraph(style, vec![run(style, EMPTY_PLACEHOLDER, false, false)]));
    }
    for block in blocks {
        push_block(&mut paragraphs, block);
    }

    DocumentTree {
        page,
        title,
        paragraphs,
    }
}

fn push_block(out: &mut Vec<Paragraph>, block: &Block) {
    let style = &block.style;
    match &block.content {
        StructuredBlock::Title { text } => {
            let mut p = paragraph(style, vec![run(style, text, style.bold, false)]);
            p.style_id = Some("Title".into());
            out.push(p);
        }
        StructuredBlock::Abstract { text } => {
            let label_style = BlockStyle {
                size_pt: style.label_size_pt.unwrap_or(style.size_pt),
                align: Alignment::Center,
                space_before_pt: style.space_before_pt,
                space_after_pt: 6,
                bold: true,
                ..style.clone()
            };
            out.push(paragraph(&label_style, vec![run(&label_style, "Abstract", true, false)]));
            let body = BlockStyle {
                space_before_pt: 0,
                ..style.clone()
            };
            out.push(paragraph(&body, vec![run(&body, text, false, false)]));
        }
        StructuredBlock::Heading {
            number,
            level,
            text,
        } => {
            let level = (*level).clamp(1, 4);
            let mut p = paragraph(
                style,
                vec![run(style, heading_text(number.as_ref(), text), style.bold, false)],
            );
            p.style_id = Some(format!("Heading{level}"));
            p.heading_level = Some(level);
            out.push(p);
        }
        StructuredBlock::Paragraph { text } => {
            out.push(paragraph(style, vec![run(style, text, false, false)]));
        }
        StructuredBlock::ListItem {
            ordered,
            number,
            label,
            text,
        } => {
            let mut runs = Vec::with_capacity(3);
            if let (true, Some(n)) = (ordered, number) {
                runs.push(run(style, format!("{n}. "), true, false));
            }
            if let Some(label) = label {
                runs.push(run(style, format!("{label}: "), true, false));
            }
            runs.push(run(style, text, false, false));
            let mut p = paragraph(style, runs);
            p.bullet = !ordered;
            out.push(p);
        }
        StructuredBlock::Reference { raw, title, .. } => {
            let split = title.and_then(|s| {
                Some((raw.get(..s.start)?, raw.get(s.range())?, raw.get(s.end..)?))
            });
            let runs = match split {
                Some((before, t, after)) => [(before, false), (t, true), (after, false)]
                    .into_iter()
                    .filter(|(s, _)| !s.is_empty())
                    .map(|(s, italic)| run(style, s, false, italic))
                    .collect(),
                None => vec![run(style, raw, false, false)],
            };
            out.push(paragraph(style, runs));
        }
        StructuredBlock::Flowchart { nodes } => {
            let last = nodes.len().saturating_sub(1);
            for (i, node) in nodes.iter().enumerate() {
                let mut p = paragraph(style, vec![run(style, format!("[{node}]"), false, false)]);
                if i > 0 {
                    p.spacing_before = 0;
                }
                if i < last {
                    p.spacing_after = 0;
                    out.push(p);
                    let mut arrow = paragraph(style, vec![run(style, "↓", false, false)]);
                    arrow.spacing_before = 0;
                    arrow.spacing_after = 0;
                    out.push(arrow);
                } else {
                    out.push(p);
                }
            }
        }
        StructuredBlock::Code { text } => {
            out.push(paragraph(style, vec![run(style, text, false, false)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentKind;
    use crate::pipeline::build::classify_and_build;

    fn tree(raw: &str) -> DocumentTree {
        to_document_model(&classify_and_build(raw, DocumentKind::GenericReport))
    }

    #[test]
    fn empty_document_has_placeholder() {
        let t = to_document_model(&[]);
        assert_eq!(t.paragraphs.len(), 1);
        assert_eq!(t.plain_text(), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn units_are_converted() {
        let t = tree("1. Introduction\nBody.");
        let h = &t.paragraphs[0];
        assert_eq!(h.style_id.as_deref(), Some("Heading1"));
        assert_eq!(h.runs[0].size_half_points, 52);
        assert_eq!(h.spacing_before, 480);
        assert_eq!(h.runs[0].text, "1. Introduction");
        let p = &t.paragraphs[1];
        assert_eq!(p.runs[0].size_half_points, 24);
        assert_eq!(p.spacing_after, 180);
        assert_eq!(p.line, 384);
        assert!(!p.runs[0].bold);
    }

    #[test]
    fn reference_title_is_italic_and_nothing_bold() {
        let t = tree(
            "1. Smith, J., 2020. *Climate Effects*. Journal X, 1(2), pp.1-9. URL: https://doi.org/10.1/x",
        );
        let runs = &t.paragraphs[0].runs;
        assert!(runs.iter().all(|r| !r.bold));
        let italic: Vec<_> = runs.iter().filter(|r| r.italic).collect();
        assert_eq!(italic.len(), 1);
        assert_eq!(italic[0].text, "Climate Effects");
        assert!(!t.plain_text().contains("https://"));
    }

    #[test]
    fn list_markers_and_labels_bold() {
        let t = tree("2. Literature Review\n1. Scope: Narrow.\n- plain bullet");
        let ordered = &t.paragraphs[1];
        assert_eq!(ordered.runs[0].text, "1. ");
        assert!(ordered.runs[0].bold);
        assert_eq!(ordered.runs[1].text, "Scope: ");
        assert!(ordered.runs[1].bold);
        assert!(!ordered.runs[2].bold);
        assert!(!ordered.bullet);
        assert!(t.paragraphs[2].bullet);
    }

    #[test]
    fn labelled_bullet_is_still_a_bullet() {
        let t = tree("- Scalability: grows with load");
        let p = &t.paragraphs[0];
        assert!(p.bullet);
        assert_eq!(p.runs[0].text, "Scalability: ");
        assert!(p.runs[0].bold);
    }

    #[test]
    fn flowchart_interleaves_arrows() {
        let t = tree("[A]\n↓\n[B]");
        let texts: Vec<_> = t.paragraphs.iter().map(|p| p.runs[0].text.clone()).collect();
        assert_eq!(texts, vec!["[A]", "↓", "[B]"]);
        assert!(t.paragraphs.iter().all(|p| p.runs[0].font == "Courier New"));
    }

    #[test]
    fn geometry_follows_page_size() {
        let g = PageGeometry::new(PageSize::Letter, 1440);
        assert_eq!((g.width, g.height, g.margin), (12240, 15840, 1440));
        assert_eq!(PageGeometry::default().width, 11906);
    }
}
