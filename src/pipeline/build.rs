//! Structured document builder.
//!
//! Folds the classifier's line stream into [`Block`]s: consecutive prose
//! lines become one paragraph, diagram lines become one flowchart,
//! wrapped reference tails are re-attached, and every block gets its style
//! from the shared table. The builder is a pure function of its input.

use crate::config::KindThresholds;
use crate::error::ClassificationDegraded;
use crate::model::{Block, DocumentKind, DottedNumber, SectionEntry, Span, StructuredBlock};
use crate::pipeline::classify::{classify, ClassifiedLine, Classifier, Role};
use crate::pipeline::kind::detect_kind;
use crate::pipeline::style::style_for;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Blocks plus everything learned while building them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub kind: DocumentKind,
    pub blocks: Vec<Block>,
    pub degraded: Vec<ClassificationDegraded>,
}

/// Detect the kind of `raw`, then classify and build it.
pub fn build_document(raw: &str, thresholds: &KindThresholds) -> BuildReport {
    let kind = detect_kind(raw, thresholds);
    build_with_report(classify(raw, kind))
}

/// Classify `raw` under `kind` and build blocks.
pub fn classify_and_build(raw: &str, kind: DocumentKind) -> Vec<Block> {
    build(classify(raw, kind), kind)
}

/// Drain a classifier, keeping its degradation notes.
pub fn build_with_report(mut classifier: Classifier<'_>) -> BuildReport {
    let kind = classifier.kind();
    let blocks = build(classifier.by_ref(), kind);
    let degraded = classifier.into_degradations();
    if !degraded.is_empty() {
        debug!("{} line(s) degraded to paragraphs", degraded.len());
    }
    BuildReport {
        kind,
        blocks,
        degraded,
    }
}

/// Build styled blocks from classified lines.
pub fn build<I>(lines: I, kind: DocumentKind) -> Vec<Block>
where
    I: IntoIterator<Item = ClassifiedLine>,
{
    let mut asm = Assembler::default();
    for line in lines {
        asm.push(line);
    }
    let blocks = asm.finish(kind);
    debug!("Built {} blocks for {} document", blocks.len(), kind);
    blocks
        .into_iter()
        .map(|content| Block {
            style: style_for(&content),
            content,
        })
        .collect()
}

#[derive(Default)]
struct Assembler {
    blocks: Vec<StructuredBlock>,
    abstract_at: Option<usize>,
    abstract_open: bool,
    heading_number: Option<DottedNumber>,
}

impl Assembler {
    fn push(&mut self, line: ClassifiedLine) {
        let ClassifiedLine {
            after_blank, role, ..
        } = line;

        if !matches!(role, Role::Paragraph(_)) {
            self.abstract_open = false;
        }

        match role {
            Role::Title(text) => {
                if self.has_title() {
                    self.blocks.push(StructuredBlock::paragraph(text));
                } else {
                    self.blocks.insert(0, StructuredBlock::Title { text });
                    if let Some(at) = self.abstract_at.as_mut() {
                        *at += 1;
                    }
                }
            }
            Role::AbstractMarker => {
                if self.abstract_at.is_none() {
                    self.abstract_at = Some(self.blocks.len());
                    self.blocks.push(StructuredBlock::Abstract {
                        text: String::new(),
                    });
                    self.abstract_open = true;
                }
            }
            Role::Paragraph(text) => self.paragraph(text, after_blank),
            Role::Heading {
                number,
                level,
                text,
            } => {
                let level = number.as_ref().map_or(level, |n| n.level());
                self.heading_number = number.clone();
                self.blocks.push(StructuredBlock::Heading {
                    number,
                    level,
                    text,
                });
            }
            Role::ListItem {
                number,
                label,
                text,
            } => {
                let number = number.filter(|n| !self.repeats_chapter(*n));
                self.blocks.push(StructuredBlock::ListItem {
                    ordered: number.is_some(),
                    number,
                    label,
                    text,
                });
            }
            Role::Reference(parts) => self.blocks.push(StructuredBlock::Reference {
                raw: parts.raw,
                title: parts.title,
                url: parts.url,
            }),
            Role::ReferenceContinuation(parts) => match self.blocks.last_mut() {
                Some(StructuredBlock::Reference { raw, title, url }) => {
                    if !parts.raw.is_empty() {
                        let offset = if raw.is_empty() { 0 } else { raw.len() + 1 };
                        if !raw.is_empty() {
                            raw.push(' ');
                        }
                        raw.push_str(&parts.raw);
                        if title.is_none() {
                            *title = parts.title.map(|s| Span {
                                start: s.start + offset,
                                end: s.end + offset,
                            });
                        }
                    }
                    if url.is_none() {
                        *url = parts.url;
                    }
                }
                _ => self.blocks.push(StructuredBlock::Reference {
                    raw: parts.raw,
                    title: parts.title,
                    url: parts.url,
                }),
            },
            Role::Flowchart(nodes) => match self.blocks.last_mut() {
                Some(StructuredBlock::Flowchart { nodes: existing }) => existing.extend(nodes),
                _ if nodes.is_empty() => {}
                _ => self.blocks.push(StructuredBlock::Flowchart { nodes }),
            },
            Role::Code(text) => self.blocks.push(StructuredBlock::Code { text }),
        }
    }

    fn paragraph(&mut self, text: String, after_blank: bool) {
        if self.abstract_open {
            if let Some(StructuredBlock::Abstract { text: body }) =
                self.abstract_at.and_then(|i| self.blocks.get_mut(i))
            {
                if !body.is_empty() {
                    body.push(' ');
                }
                body.push_str(&text);
                return;
            }
        }
        if !after_blank {
            if let Some(StructuredBlock::Paragraph { text: body }) = self.blocks.last_mut() {
                body.push(' ');
                body.push_str(&text);
                return;
            }
        }
        self.blocks.push(StructuredBlock::paragraph(text));
    }

    /// A list numeral equal to the enclosing chapter inside one of its
    /// subsections is a repeated prefix, not an ordinal.
    fn repeats_chapter(&self, n: u32) -> bool {
        matches!(&self.heading_number, Some(h) if h.depth() >= 2 && h.top() == n)
    }

    fn has_title(&self) -> bool {
        matches!(self.blocks.first(), Some(StructuredBlock::Title { .. }))
    }

    fn finish(mut self, kind: DocumentKind) -> Vec<StructuredBlock> {
        // The abstract sits directly after the title, or first.
        if let Some(at) = self.abstract_at {
            let block = self.blocks.remove(at);
            let empty = matches!(&block, StructuredBlock::Abstract { text } if text.trim().is_empty());
            if !empty {
                let slot = usize::from(self.has_title());
                self.blocks.insert(slot, block);
            }
        }

        if !self.has_title() {
            if let Some(title) = kind.default_title() {
                self.blocks.insert(
                    0,
                    StructuredBlock::Title {
                        text: title.to_string(),
                    },
                );
            }
        }

        self.blocks.retain(|b| match b {
            StructuredBlock::Flowchart { nodes } => !nodes.is_empty(),
            StructuredBlock::Paragraph { text } => !text.trim().is_empty(),
            _ => true,
        });
        self.blocks
    }
}

/// Headings of a built document, in order.
pub fn outline(blocks: &[Block]) -> Vec<SectionEntry> {
    blocks
        .iter()
        .filter_map(|b| match &b.content {
            StructuredBlock::Heading {
                number,
                level,
                text,
            } => Some(SectionEntry {
                level: *level,
                number: number.as_ref().map(|n| n.to_string()),
                title: text.clone(),
            }),
            _ => None,
        })
        .collect()
}
