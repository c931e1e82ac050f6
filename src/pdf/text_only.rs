//! In-process text-only PDF rendering.
//!
//! The last engine in the chain: no browser and no external process. Blocks
//! are first turned into a flat [`Piece`] plan (plain text runs with a size,
//! weight and alignment), which `genpdf` then wraps and paginates onto A4
//! pages with 25 mm margins. Text is drawn with an embedded TrueType font, so
//! anything the font covers survives as-is; the only thing taken from the
//! host is that font file.
//!
//! Styling is deliberately plain: serif 12 body, bold headings at 18/16/14 by
//! depth, bullets and numbers inline, references indented with the title in
//! italics. Decorative dash lines are dropped and any inline markup left in
//! the text is stripped.

use crate::model::{heading_text, Block, StructuredBlock};
use crate::pdf::EngineError;
use crate::pipeline::inline::strip_emphasis;
use genpdf::elements::{Break, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Alignment, Element, Margins};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BODY_SIZE: u8 = 12;
pub const CODE_SIZE: u8 = 10;
pub const MARGIN_MM: i32 = 25;
const INDENT_MM: i32 = 7;
const LINE_SPACING: f64 = 1.2;

/// Longest run of characters drawn without a break opportunity. Longer
/// words (URLs, unspaced scripts) are split so no line overflows the page.
const MAX_WORD_CHARS: usize = 24;

/// Heading size by depth: 18, 16, then 14 for everything deeper.
pub fn heading_size(level: u8) -> u8 {
    match level {
        0 | 1 => 18,
        2 => 16,
        _ => 14,
    }
}

// ── Layout plan ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl Run {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            italic: false,
        }
    }
}

/// One drawable step of the page flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Line {
        runs: Vec<Run>,
        size: u8,
        align: Alignment,
        indent: bool,
        mono: bool,
    },
    /// Vertical space, in lines.
    Gap(f64),
}

impl Piece {
    fn text(runs: Vec<Run>, size: u8, align: Alignment) -> Self {
        Piece::Line {
            runs,
            size,
            align,
            indent: false,
            mono: false,
        }
    }

    fn indented(runs: Vec<Run>) -> Self {
        Piece::Line {
            runs,
            size: BODY_SIZE,
            align: Alignment::Left,
            indent: true,
            mono: false,
        }
    }

    /// Concatenated text of a line; empty for gaps.
    pub fn plain_text(&self) -> String {
        match self {
            Piece::Line { runs, .. } => runs.iter().map(|r| r.text.as_str()).collect(),
            Piece::Gap(_) => String::new(),
        }
    }
}

static RE_DASH_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s\-_=*~]{3,}$").unwrap());

/// Text as it should be drawn: no markup, no decorative rules.
fn plain(text: &str) -> String {
    text.lines()
        .filter(|l| !RE_DASH_LINE.is_match(l))
        .map(strip_emphasis)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flatten blocks into the sequence of lines and gaps to draw.
pub fn layout_plan(blocks: &[Block]) -> Vec<Piece> {
    let mut plan = Vec::new();
    for block in blocks {
        push_block(&mut plan, &block.content);
    }
    plan
}

fn push_block(plan: &mut Vec<Piece>, block: &StructuredBlock) {
    match block {
        StructuredBlock::Title { text } => {
            plan.push(Piece::text(vec![Run::bold(plain(text))], 18, Alignment::Center));
            plan.push(Piece::Gap(1.0));
        }
        StructuredBlock::Abstract { text } => {
            plan.push(Piece::text(vec![Run::bold("Abstract")], 14, Alignment::Center));
            plan.push(Piece::text(vec![Run::plain(plain(text))], BODY_SIZE, Alignment::Left));
            plan.push(Piece::Gap(0.5));
        }
        StructuredBlock::Heading {
            number,
            level,
            text,
        } => {
            plan.push(Piece::Gap(0.5));
            let text = heading_text(number.as_ref(), &plain(text));
            plan.push(Piece::text(vec![Run::bold(text)], heading_size(*level), Alignment::Left));
            plan.push(Piece::Gap(0.3));
        }
        StructuredBlock::Paragraph { text } => {
            let text = plain(text);
            if !text.is_empty() {
                plan.push(Piece::text(vec![Run::plain(text)], BODY_SIZE, Alignment::Left));
                plan.push(Piece::Gap(0.5));
            }
        }
        StructuredBlock::ListItem {
            ordered,
            number,
            label,
            text,
        } => {
            let mut runs = Vec::with_capacity(3);
            match (ordered, number) {
                (true, Some(n)) => runs.push(Run::plain(format!("{n}. "))),
                (false, _) => runs.push(Run::plain("\u{2022} ")),
                _ => {}
            }
            if let Some(label) = label {
                runs.push(Run::bold(format!("{}: ", plain(label))));
            }
            runs.push(Run::plain(plain(text)));
            plan.push(Piece::indented(runs));
            plan.push(Piece::Gap(0.2));
        }
        StructuredBlock::Reference { raw, title, .. } => {
            let split = title.and_then(|s| Some((raw.get(..s.start)?, raw.get(s.range())?, raw.get(s.end..)?)));
            let runs = match split {
                Some((before, t, after)) => [(before, false), (t, true), (after, false)]
                    .into_iter()
                    .filter(|(s, _)| !s.is_empty())
                    .map(|(s, italic)| Run {
                        text: s.to_string(),
                        bold: false,
                        italic,
                    })
                    .collect(),
                None => vec![Run::plain(plain(raw))],
            };
            plan.push(Piece::indented(runs));
            plan.push(Piece::Gap(0.5));
        }
        StructuredBlock::Flowchart { nodes } => {
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    plan.push(Piece::text(vec![Run::plain("\u{2193}")], BODY_SIZE, Alignment::Center));
                }
                plan.push(Piece::text(
                    vec![Run::plain(format!("[{}]", plain(node)))],
                    BODY_SIZE,
                    Alignment::Center,
                ));
            }
            plan.push(Piece::Gap(0.5));
        }
        StructuredBlock::Code { text } => {
            for line in text.lines() {
                let line = line.trim_end();
                if line.is_empty() {
                    plan.push(Piece::Gap(0.5));
                } else {
                    plan.push(Piece::Line {
                        runs: vec![Run::plain(line)],
                        size: CODE_SIZE,
                        align: Alignment::Left,
                        indent: true,
                        mono: true,
                    });
                }
            }
            plan.push(Piece::Gap(0.5));
        }
    }
}

/// Insert spaces into words longer than [`MAX_WORD_CHARS`].
fn break_long_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let chars: Vec<char> = word.chars().collect();
        for (j, chunk) in chars.chunks(MAX_WORD_CHARS).enumerate() {
            if j > 0 {
                out.push(' ');
            }
            out.extend(chunk);
        }
    }
    out
}

// ── Fonts ────────────────────────────────────────────────────────────────

/// Regular, bold, italic and bold-italic file names of one family.
struct FamilyFiles {
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

const TEXT_FAMILIES: &[FamilyFiles] = &[
    FamilyFiles {
        regular: "LiberationSerif-Regular.ttf",
        bold: "LiberationSerif-Bold.ttf",
        italic: "LiberationSerif-Italic.ttf",
        bold_italic: "LiberationSerif-BoldItalic.ttf",
    },
    FamilyFiles {
        regular: "DejaVuSerif.ttf",
        bold: "DejaVuSerif-Bold.ttf",
        italic: "DejaVuSerif-Italic.ttf",
        bold_italic: "DejaVuSerif-BoldItalic.ttf",
    },
    FamilyFiles {
        regular: "NotoSerif-Regular.ttf",
        bold: "NotoSerif-Bold.ttf",
        italic: "NotoSerif-Italic.ttf",
        bold_italic: "NotoSerif-BoldItalic.ttf",
    },
    FamilyFiles {
        regular: "times.ttf",
        bold: "timesbd.ttf",
        italic: "timesi.ttf",
        bold_italic: "timesbi.ttf",
    },
    FamilyFiles {
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
    },
];

const MONO_FILES: &[&str] = &[
    "LiberationMono-Regular.ttf",
    "DejaVuSansMono.ttf",
    "NotoSansMono-Regular.ttf",
    "cour.ttf",
];

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/truetype/noto",
    "/usr/share/fonts/noto",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "C:\\Windows\\Fonts",
];

/// Font families for one render.
pub struct Fonts {
    text: FontFamily<FontData>,
    mono: Option<FontFamily<FontData>>,
}

impl std::fmt::Debug for Fonts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fonts").field("mono", &self.mono.is_some()).finish()
    }
}

fn search_dirs(font_dir: Option<&Path>) -> Vec<PathBuf> {
    font_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONT_DIRS.iter().map(PathBuf::from))
        .collect()
}

fn load_font(path: &Path) -> Result<FontData, EngineError> {
    let data = std::fs::read(path).map_err(|e| EngineError::Io(format!("{}: {}", path.display(), e)))?;
    FontData::new(data, None).map_err(|e| EngineError::Output(format!("{}: {}", path.display(), e)))
}

/// Load a family whose regular face is in `dir`. Missing styled faces
/// fall back to the regular one.
fn load_family(dir: &Path, files: &FamilyFiles) -> Result<FontFamily<FontData>, EngineError> {
    let regular = load_font(&dir.join(files.regular))?;
    let styled = |name: &str| {
        let path = dir.join(name);
        if path.is_file() {
            load_font(&path)
        } else {
            Ok(regular.clone())
        }
    };
    Ok(FontFamily {
        bold: styled(files.bold)?,
        italic: styled(files.italic)?,
        bold_italic: styled(files.bold_italic)?,
        regular: regular.clone(),
    })
}

/// Find a TrueType family in `font_dir`, then in the usual system locations.
pub fn discover_fonts(font_dir: Option<&Path>) -> Result<Fonts, EngineError> {
    let dirs = search_dirs(font_dir);
    let text = dirs
        .iter()
        .flat_map(|dir| TEXT_FAMILIES.iter().map(move |f| (dir, f)))
        .find(|(dir, f)| dir.join(f.regular).is_file())
        .map(|(dir, f)| {
            debug!("Text-only font: {}", dir.join(f.regular).display());
            load_family(dir, f)
        })
        .transpose()?
        .ok_or_else(|| EngineError::FontMissing { searched: dirs.clone() })?;

    let mono = dirs
        .iter()
        .flat_map(|dir| MONO_FILES.iter().map(move |f| dir.join(f)))
        .find(|p| p.is_file())
        .map(|p| {
            load_font(&p).map(|data| FontFamily {
                regular: data.clone(),
                bold: data.clone(),
                italic: data.clone(),
                bold_italic: data,
            })
        })
        .transpose()?;

    Ok(Fonts { text, mono })
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render blocks to PDF bytes with fonts found under `font_dir` or the
/// system font directories.
pub fn render_blocks(blocks: &[Block], font_dir: Option<&Path>) -> Result<Vec<u8>, EngineError> {
    let fonts = discover_fonts(font_dir)?;
    render_plan(&layout_plan(blocks), title_of(blocks), fonts)
}

fn title_of(blocks: &[Block]) -> Option<String> {
    blocks.iter().find_map(|b| match &b.content {
        StructuredBlock::Title { text } => Some(plain(text)),
        _ => None,
    })
}

/// Draw a plan. Wrapping and page breaks are left to `genpdf`.
pub fn render_plan(plan: &[Piece], title: Option<String>, fonts: Fonts) -> Result<Vec<u8>, EngineError> {
    let mut doc = genpdf::Document::new(fonts.text);
    doc.set_title(title.unwrap_or_else(|| "Document".to_string()));
    doc.set_paper_size(genpdf::PaperSize::A4);
    doc.set_font_size(BODY_SIZE);
    doc.set_line_spacing(LINE_SPACING);
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(MARGIN_MM);
    doc.set_page_decorator(decorator);
    let mono = fonts.mono.map(|family| doc.add_font_family(family));

    for piece in plan {
        match piece {
            Piece::Gap(lines) => doc.push(Break::new(*lines)),
            Piece::Line {
                runs,
                size,
                align,
                indent,
                mono: is_code,
            } => {
                let mut base = Style::new().with_font_size(*size);
                if let (true, Some(family)) = (*is_code, &mono) {
                    base = base.with_font_family(family.clone());
                }
                let mut paragraph = Paragraph::default();
                for run in runs {
                    let mut style = base.clone();
                    if run.bold {
                        style = style.bold();
                    }
                    if run.italic {
                        style = style.italic();
                    }
                    paragraph.push(StyledString::new(break_long_words(&run.text), style));
                }
                let paragraph = paragraph.aligned(*align);
                if *indent {
                    doc.push(paragraph.padded(Margins::trbl(0, 0, 0, INDENT_MM)));
                } else {
                    doc.push(paragraph);
                }
            }
        }
    }

    let mut out = Vec::new();
    doc.render(&mut out)
        .map_err(|e| EngineError::Output(format!("text-only layout failed: {}", e)))?;
    debug!("Text-only PDF: {} pieces, {} bytes", plan.len(), out.len());
    Ok(out)
}
