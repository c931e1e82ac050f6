//! The style table: presentation values for every block variant.
//!
//! Built once on first use and shared by every document. Renderers never
//! choose sizes or spacing themselves; they read the [`BlockStyle`] the
//! builder attached.

use crate::model::{Alignment, BlockStyle, FontFamily, StructuredBlock};
use crate::pipeline::classify::major_section_number;
use once_cell::sync::Lazy;

/// Line height used by every renderer, as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.6;

/// Resolved styles, one per block variant (headings per level).
#[derive(Debug, Clone)]
pub struct StyleTable {
    pub title: BlockStyle,
    pub abstract_: BlockStyle,
    /// Index 0 is level 1.
    pub headings: [BlockStyle; 4],
    /// Level-1 heading of a major report section.
    pub major_heading: BlockStyle,
    pub paragraph: BlockStyle,
    pub list_item: BlockStyle,
    pub reference: BlockStyle,
    pub flowchart: BlockStyle,
    pub code: BlockStyle,
}

static STYLE_TABLE: Lazy<StyleTable> = Lazy::new(StyleTable::academic);

/// The shared table.
pub fn style_table() -> &'static StyleTable {
    &STYLE_TABLE
}

fn base(size_pt: u32) -> BlockStyle {
    BlockStyle {
        font: FontFamily::Serif,
        size_pt,
        label_size_pt: None,
        bold: false,
        align: Alignment::Left,
        space_before_pt: 0,
        space_after_pt: 0,
        indent_pt: 0,
        hanging_pt: 0,
        background: None,
        border: None,
    }
}

fn heading(size_pt: u32, before: u32, after: u32) -> BlockStyle {
    BlockStyle {
        bold: true,
        space_before_pt: before,
        space_after_pt: after,
        ..base(size_pt)
    }
}

impl StyleTable {
    /// Times New Roman body at 12pt, headings strictly decreasing from 26pt.
    fn academic() -> Self {
        Self {
            title: BlockStyle {
                bold: true,
                align: Alignment::Center,
                space_after_pt: 20,
                ..base(28)
            },
            abstract_: BlockStyle {
                label_size_pt: Some(18),
                align: Alignment::Justify,
                space_before_pt: 6,
                space_after_pt: 12,
                ..base(12)
            },
            headings: [
                heading(26, 20, 10),
                heading(18, 14, 9),
                heading(16, 10, 6),
                heading(14, 8, 5),
            ],
            major_heading: heading(26, 24, 10),
            paragraph: BlockStyle {
                align: Alignment::Justify,
                space_after_pt: 9,
                ..base(12)
            },
            list_item: BlockStyle {
                space_after_pt: 6,
                indent_pt: 20,
                hanging_pt: 14,
                ..base(12)
            },
            reference: BlockStyle {
                space_after_pt: 9,
                indent_pt: 20,
                hanging_pt: 20,
                ..base(12)
            },
            flowchart: BlockStyle {
                font: FontFamily::Monospace,
                align: Alignment::Center,
                space_before_pt: 6,
                space_after_pt: 12,
                background: Some("e8f4f8".into()),
                border: Some("4a90e2".into()),
                ..base(11)
            },
            code: BlockStyle {
                font: FontFamily::Monospace,
                space_before_pt: 6,
                space_after_pt: 12,
                background: Some("f5f5f5".into()),
                ..base(10)
            },
        }
    }

    /// Style for one block.
    pub fn resolve(&self, block: &StructuredBlock) -> BlockStyle {
        match block {
            StructuredBlock::Title { .. } => self.title.clone(),
            StructuredBlock::Abstract { .. } => self.abstract_.clone(),
            StructuredBlock::Heading { level, text, .. } => {
                if *level <= 1 && major_section_number(text).is_some() {
                    self.major_heading.clone()
                } else {
                    let idx = usize::from((*level).clamp(1, 4) - 1);
                    self.headings[idx].clone()
                }
            }
            StructuredBlock::Paragraph { .. } => self.paragraph.clone(),
            StructuredBlock::ListItem { .. } => self.list_item.clone(),
            StructuredBlock::Reference { .. } => self.reference.clone(),
            StructuredBlock::Flowchart { .. } => self.flowchart.clone(),
            StructuredBlock::Code { .. } => self.code.clone(),
        }
    }
}

/// Style for one block from the shared table.
pub fn style_for(block: &StructuredBlock) -> BlockStyle {
    STYLE_TABLE.resolve(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DottedNumber;

    #[test]
    fn heading_sizes_strictly_decrease() {
        let t = style_table();
        let sizes: Vec<u32> = t.headings.iter().map(|s| s.size_pt).collect();
        assert!(sizes.windows(2).all(|w| w[0] > w[1]), "{:?}", sizes);
        assert!(t.title.size_pt >= sizes[0]);
        assert!(sizes[3] > t.paragraph.size_pt);
    }

    #[test]
    fn body_text_is_twelve_point_serif() {
        let p = style_for(&StructuredBlock::paragraph("x"));
        assert_eq!(p.size_pt, 12);
        assert_eq!(p.font, FontFamily::Serif);
        assert!(!p.bold);
        assert_eq!(p.align, Alignment::Justify);
    }

    #[test]
    fn references_are_never_bold() {
        let r = style_for(&StructuredBlock::Reference {
            raw: "Smith, J., 2020.".into(),
            title: None,
            url: None,
        });
        assert!(!r.bold);
        assert_eq!(r.hanging_pt, 20);
    }

    #[test]
    fn major_sections_get_extra_space() {
        let major = style_for(&StructuredBlock::numbered_heading(
            DottedNumber::from(8),
            "Evaluation",
        ));
        let other = style_for(&StructuredBlock::numbered_heading(
            DottedNumber::from(3),
            "Background Notes",
        ));
        assert_eq!(major.space_before_pt, 24);
        assert_eq!(other.space_before_pt, 20);
        assert_eq!(major.size_pt, other.size_pt);
    }

    #[test]
    fn deep_heading_levels_clamp() {
        let h = style_for(&StructuredBlock::Heading {
            number: None,
            level: 9,
            text: "Deep".into(),
        });
        assert_eq!(h.size_pt, 14);
    }
}
