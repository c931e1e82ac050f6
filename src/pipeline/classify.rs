//! Section classifier: assign a semantic role to every source line.
//!
//! [`classify`] returns a lazy [`Classifier`] iterator. Each physical line
//! (or contiguous run, for code fences) is matched against an ordered rule
//! table for the document's kind; the first rule that claims a line wins.
//! Lines no rule claims become paragraphs, so classification never fails.
//!
//! ## State machine
//!
//! ```text
//! Default ──[Box] / ↓──▶ InFlowchart ──heading / 2nd stray line──▶ Default
//! Default ──"6.1 …"────▶ InSubsection(6.1) ──chapter heading────▶ Default
//! Default ──"Contents"─▶ InToc ──rule / first non-entry line────▶ Default
//! ```
//!
//! The flowchart state drops component-description lines (`• Database: The
//! store …`) that models like to append under a diagram. The subsection
//! state lets a stray repeated chapter numeral (`6. Unit Testing` under
//! `6.1`) be read as a list item rather than a duplicate chapter.

use crate::error::ClassificationDegraded;
use crate::model::{DocumentKind, DottedNumber};
use crate::pipeline::inline::{parse_reference, strip_bold, strip_emphasis, ReferenceParts};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::iter::Enumerate;
use std::str::Lines;
use tracing::debug;

/// One classified source line.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLine {
    /// 1-based line number in the source.
    pub line_no: usize,
    /// A blank line (or horizontal rule) separated this line from the previous one.
    pub after_blank: bool,
    pub role: Role,
}

/// The semantic role of a line, with its captured text.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Title(String),
    /// The "Abstract" caption; the following prose is the abstract text.
    AbstractMarker,
    Heading {
        number: Option<DottedNumber>,
        level: u8,
        text: String,
    },
    Paragraph(String),
    ListItem {
        number: Option<u32>,
        label: Option<String>,
        text: String,
    },
    Reference(ReferenceParts),
    /// A soft-wrapped tail of the previous reference.
    ReferenceContinuation(ReferenceParts),
    /// Node labels on this line; empty for arrow-only lines.
    Flowchart(Vec<String>),
    Code(String),
}

/// Observable classifier state, mainly for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierState {
    Default,
    InFlowchart,
    InToc,
    InSubsection(DottedNumber),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Default,
    Toc,
    Flowchart { nodes: Vec<String>, strays: u8 },
}

/// Classify `raw` under the rule set for `kind`.
pub fn classify(raw: &str, kind: DocumentKind) -> Classifier<'_> {
    Classifier::new(raw, kind)
}

/// Lazy, finite, non-restartable iterator over [`ClassifiedLine`]s.
pub struct Classifier<'a> {
    lines: Enumerate<Lines<'a>>,
    kind: DocumentKind,
    mode: Mode,
    section: Option<DottedNumber>,
    in_references: bool,
    pending: VecDeque<ClassifiedLine>,
    degraded: Vec<ClassificationDegraded>,
    line_no: usize,
    after_blank: bool,
    content_seen: usize,
    title_seen: bool,
    abstract_seen: bool,
    heading_seen: bool,
    last_was_reference: bool,
}

// ── Shared patterns ──────────────────────────────────────────────────────

static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:-{2,}|\*{3,}|_{3,}|={3,})$").unwrap());

static RE_TOC_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#{1,6}\s*)?(?:\*\*)?(?:table of contents|contents)(?:\*\*)?:?\s*$").unwrap()
});

static RE_TOC_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{3,}|…{2,}|^\s*[-*]\s*\[[^\]]+\]\(#|\s\d+$").unwrap());

static RE_TITLE_PRODUCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ResearchAid\s+AI").unwrap());

static RE_ABSTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#{1,6}\s*)?(?:\*\*|__)?abstract(?:\*\*|__)?\s*(?::\s*(?:\*\*|__)?\s*(.*))?$").unwrap()
});

static RE_MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").unwrap());

static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}(?:\.\d{1,3})*)(?:\.\s*|\s+)(\S.*)$").unwrap());

static RE_ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3})[.)]\s+(.+)$").unwrap());

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[*\-+•▪◦‣]\s+(.+)$").unwrap());

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Za-z0-9'’/&()\-]*(?:\s+[A-Za-z0-9'’/&()\-]+){0,5}):\s+(\S.*)$").unwrap()
});

static RE_TITLE_CASE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][a-z]+(?:[\s\-][A-Z][a-z]+){0,4}):\s+(\S.*)$").unwrap()
});

static RE_BOLD_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*([^*]+?):?\*\*:?\s*(.*)$").unwrap());

static RE_REFERENCE_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\d+[.)]\s+)?[A-Z][A-Za-z'’\-]+,\s*(.{0,60}?)\(?\b(?:1[5-9]|20)\d{2}[a-z]?(\)|[.,:;]|\s|$)",
    )
    .unwrap()
});

static RE_INITIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]\.|et al").unwrap());

static RE_FLOW_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]").unwrap());

static RE_ARROW_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(?:→|->|⟶|=>)\s*").unwrap());

static RE_COMPONENT_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[*\-+•]\s*)?\**([A-Z][\w /&\-]{1,60}?)\**\s*:\**\s*(?:This|The|It|A|An|Acts|Handles|Manages|Stores|Provides|Is|Serves|Receives|Processes|Contains)\b",
    )
    .unwrap()
});

static RE_LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#{1,6}\s+|[*\-+•▪◦‣]\s+|\d+[.)]\s+)").unwrap());

static RE_STRUCTURAL_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#|\[|\||>|\d+\.\d)").unwrap());

const KNOWN_COMPONENTS: &[&str] = &[
    "user interface",
    "api gateway",
    "authentication service",
    "database",
    "backend",
    "frontend",
    "server",
    "client",
    "cache",
    "load balancer",
    "message queue",
];

/// Major sections of a generated report and their fixed numbers.
const MAJOR_SECTIONS: &[(&str, u32)] = &[
    ("introduction", 1),
    ("literature review", 2),
    ("requirements analysis", 3),
    ("system architecture", 4),
    ("system architecture/design", 4),
    ("system architecture and design", 4),
    ("system design", 4),
    ("implementation", 5),
    ("testing", 6),
    ("deployment", 7),
    ("evaluation", 8),
    ("conclusion", 9),
    ("conclusions", 9),
    ("references", 10),
];

const CRITIQUE_SECTIONS: &[&str] = &[
    "summary of main arguments",
    "strengths",
    "weaknesses",
    "weaknesses and limitations",
    "critical analysis",
    "suggestions for improvement",
];

const OUTLINE_SECTIONS: &[&str] = &[
    "abstract",
    "introduction",
    "literature review",
    "methodology",
    "results",
    "discussion",
    "conclusion",
    "references",
    "bibliography",
    "appendices",
];

/// Fixed number of a major report section, matched case-insensitively.
pub fn major_section_number(name: &str) -> Option<u32> {
    let name = name.trim().trim_end_matches(':').trim().to_lowercase();
    MAJOR_SECTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, num)| *num)
}

impl<'a> Classifier<'a> {
    pub fn new(raw: &'a str, kind: DocumentKind) -> Self {
        Self {
            lines: raw.lines().enumerate(),
            kind,
            mode: Mode::Default,
            section: None,
            in_references: false,
            pending: VecDeque::new(),
            degraded: Vec::new(),
            line_no: 0,
            after_blank: false,
            content_seen: 0,
            title_seen: false,
            abstract_seen: false,
            heading_seen: false,
            last_was_reference: false,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Current state of the machine.
    pub fn state(&self) -> ClassifierState {
        match (&self.mode, &self.section) {
            (Mode::Flowchart { .. }, _) => ClassifierState::InFlowchart,
            (Mode::Toc, _) => ClassifierState::InToc,
            (Mode::Default, Some(n)) if n.depth() >= 2 => ClassifierState::InSubsection(n.clone()),
            _ => ClassifierState::Default,
        }
    }

    /// Notes recorded so far for lines that fell through to prose.
    pub fn degradations(&self) -> &[ClassificationDegraded] {
        &self.degraded
    }

    pub fn into_degradations(self) -> Vec<ClassificationDegraded> {
        self.degraded
    }

    // ── Emission ─────────────────────────────────────────────────────────

    fn emit(&mut self, role: Role) {
        let after_blank = std::mem::take(&mut self.after_blank);
        self.last_was_reference =
            matches!(role, Role::Reference(_) | Role::ReferenceContinuation(_));

        match &role {
            Role::Heading { number, text, .. } => {
                self.heading_seen = true;
                self.mode = Mode::Default;
                self.in_references = is_references_title(text);
                if let Some(n) = number {
                    self.section = Some(n.clone());
                }
            }
            Role::Flowchart(nodes) => {
                if let Mode::Flowchart { nodes: seen, strays } = &mut self.mode {
                    seen.extend(nodes.iter().cloned());
                    *strays = 0;
                } else {
                    self.mode = Mode::Flowchart {
                        nodes: nodes.clone(),
                        strays: 0,
                    };
                }
            }
            _ => {
                let end_run = match &mut self.mode {
                    Mode::Flowchart { strays, .. } => {
                        *strays += 1;
                        *strays > 1
                    }
                    _ => false,
                };
                if end_run {
                    self.mode = Mode::Default;
                }
            }
        }

        self.pending.push_back(ClassifiedLine {
            line_no: self.line_no,
            after_blank,
            role,
        });
    }

    fn paragraph(&mut self, line: &str) {
        let text = strip_emphasis(line);
        if text.is_empty() {
            return;
        }
        if let Some(m) = RE_STRUCTURAL_PREFIX.find(line) {
            let note = ClassificationDegraded::ParagraphFallback {
                line: self.line_no,
                prefix: m.as_str().to_string(),
            };
            debug!("{}", note);
            self.degraded.push(note);
        }
        self.emit(Role::Paragraph(text));
    }

    fn heading(&mut self, number: Option<DottedNumber>, fallback_level: u8, text: String) {
        let level = number.as_ref().map_or(fallback_level.clamp(1, 4), |n| n.level());
        self.emit(Role::Heading {
            number,
            level,
            text,
        });
    }

    fn list_item(&mut self, number: Option<u32>, body: &str) {
        let body = strip_bold(body);
        let (label, text) = split_label(&body, &RE_LABEL);
        self.emit(Role::ListItem {
            number,
            label,
            text,
        });
    }

    // ── Table of contents ────────────────────────────────────────────────

    /// Skip a contents block. When a horizontal rule closes it within a
    /// short window of short lines, everything up to the rule is dropped;
    /// otherwise only dot-leader entries are skipped.
    fn enter_toc(&mut self) {
        let mut ahead = self.lines.clone();
        let mut skip = 0usize;
        let mut closed = false;
        for (_, l) in ahead.by_ref().take(40) {
            skip += 1;
            let t = l.trim();
            if RE_RULE.is_match(t) {
                closed = true;
                break;
            }
            if t.chars().count() >= 80 {
                break;
            }
        }
        if closed {
            for _ in 0..skip {
                self.lines.next();
            }
            self.after_blank = true;
            debug!("Skipped {} contents lines", skip);
        } else {
            self.mode = Mode::Toc;
        }
    }

    fn consume_code(&mut self) -> String {
        let mut buf = Vec::new();
        for (_, l) in self.lines.by_ref() {
            if l.trim_start().starts_with("```") {
                break;
            }
            buf.push(l);
        }
        buf.join("\n")
    }

    // ── Rule sets ────────────────────────────────────────────────────────

    fn classify_line(&mut self, line: &str) {
        match self.kind {
            DocumentKind::Summary => self.summary_rules(line),
            DocumentKind::Critique => self.critique_rules(line),
            DocumentKind::ResearchQuestions => self.question_rules(line),
            DocumentKind::DissertationOutline => self.outline_rules(line),
            DocumentKind::GenericReport => self.report_rules(line),
        }
    }

    fn summary_rules(&mut self, line: &str) {
        let stripped = RE_LEADING_MARKER.replace(line, "");
        let text = strip_emphasis(&stripped);
        if !text.is_empty() {
            self.emit(Role::Paragraph(text));
        }
    }

    fn report_rules(&mut self, line: &str) {
        // Title: one of the first two content lines.
        if !self.title_seen && self.content_seen < 2 {
            if let Some(title) = title_candidate(line) {
                self.title_seen = true;
                self.emit(Role::Title(title));
                return;
            }
        }

        // Abstract caption, optionally followed by its text.
        if !self.abstract_seen && !self.heading_seen {
            if let Some(caps) = RE_ABSTRACT.captures(line) {
                self.abstract_seen = true;
                self.emit(Role::AbstractMarker);
                let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
                if !rest.is_empty() {
                    let text = strip_emphasis(rest);
                    self.emit(Role::Paragraph(text));
                }
                return;
            }
        }

        // Flowchart lines and, inside a flowchart, component descriptions.
        if let Some(nodes) = flowchart_nodes(line) {
            self.emit(Role::Flowchart(nodes));
            return;
        }
        if let Mode::Flowchart { nodes, .. } = &self.mode {
            if is_component_description(line, nodes) {
                debug!("Line {}: dropped flowchart description", self.line_no);
                return;
            }
        }

        // Headings that end a references section.
        if self.in_references {
            if let Some((number, text)) = self.section_heading(line) {
                self.heading(number, 1, text);
                return;
            }
            self.reference_line(line);
            return;
        }

        // Reference entries take precedence over numbered headings.
        if is_reference_line(line) {
            let body = RE_BULLET.replace(line, "$1");
            self.emit(Role::Reference(parse_reference(&body)));
            return;
        }
        if self.last_was_reference && !self.after_blank && !RE_LEADING_MARKER.is_match(line) {
            let parts = parse_reference(line);
            self.emit(Role::ReferenceContinuation(parts));
            return;
        }

        if let Some(caps) = RE_NUMBERED.captures(line) {
            if self.numbered_line(&caps[1], &caps[2]) {
                return;
            }
        }

        if let Some(caps) = RE_MD_HEADING.captures(line) {
            let hashes = caps[1].len() as u8;
            let text = strip_emphasis(&caps[2]);
            self.markdown_heading(hashes, text);
            return;
        }

        // Bare major section name, possibly bulleted or bold.
        let bare = strip_emphasis(&RE_BULLET.replace(line, "$1"));
        if let Some(n) = major_section_number(&bare) {
            let text = bare.trim_end_matches(':').trim().to_string();
            self.heading(Some(DottedNumber::from(n)), 1, text);
            return;
        }

        if let Some(caps) = RE_BULLET.captures(line) {
            self.list_item(None, &caps[1]);
            return;
        }
        if let Some(caps) = RE_ORDERED.captures(line) {
            let n = caps[1].parse().ok();
            self.list_item(n, &caps[2]);
            return;
        }
        let unbold = strip_bold(line);
        if let Some(caps) = RE_TITLE_CASE_LABEL.captures(&unbold) {
            let label = caps[1].to_string();
            let text = strip_emphasis(&caps[2]);
            self.emit(Role::ListItem {
                number: None,
                label: Some(label),
                text,
            });
            return;
        }

        self.paragraph(line);
    }

    /// Handle a `N[.N…] text` line. Returns false when the line should
    /// continue down the rule table.
    fn numbered_line(&mut self, number: &str, rest: &str) -> bool {
        let Some(number) = DottedNumber::parse(number) else {
            return false;
        };
        let text = strip_emphasis(rest);
        let too_long = text.chars().count() >= 100;
        let lowercase = text.chars().next().is_some_and(|c| c.is_lowercase());

        if number.depth() >= 2 {
            if too_long || lowercase {
                self.note_rejected(if too_long { "too long" } else { "starts lowercase" });
                self.emit(Role::Paragraph(format!("{number} {text}")));
            } else {
                self.heading(Some(number), 1, text);
            }
            return true;
        }

        let top = number.top();
        let unbold = strip_bold(rest);
        if RE_LABEL.is_match(unbold.trim()) {
            self.list_item(Some(top), rest);
            return true;
        }
        let repeats_chapter = matches!(&self.section, Some(s) if s.depth() >= 2 && s.top() == top);
        if repeats_chapter || too_long || lowercase {
            if too_long || lowercase {
                self.note_rejected(if too_long { "too long" } else { "starts lowercase" });
            }
            self.list_item(Some(top), rest);
            return true;
        }
        self.heading(Some(number), 1, text);
        true
    }

    fn markdown_heading(&mut self, hashes: u8, text: String) {
        if let Some(caps) = RE_NUMBERED.captures(&text) {
            if let Some(number) = DottedNumber::parse(&caps[1]) {
                let rest = caps[2].trim().to_string();
                self.heading(Some(number), hashes, rest);
                return;
            }
        }
        if self.kind == DocumentKind::GenericReport {
            if let Some(n) = major_section_number(&text) {
                self.heading(Some(DottedNumber::from(n)), 1, text);
                return;
            }
        }
        self.heading(None, hashes, text);
    }

    fn section_heading(&self, line: &str) -> Option<(Option<DottedNumber>, String)> {
        let text = strip_emphasis(&RE_MD_HEADING.replace(line, "$2"));
        if let Some(caps) = RE_NUMBERED.captures(&text) {
            let rest = caps[2].trim();
            if major_section_number(rest).is_some() {
                return Some((DottedNumber::parse(&caps[1]), rest.to_string()));
            }
        }
        major_section_number(&text).map(|n| (Some(DottedNumber::from(n)), text))
    }

    fn reference_line(&mut self, line: &str) {
        let body = RE_BULLET.replace(line, "$1");
        let unmarked = !RE_LEADING_MARKER.is_match(line) && !is_reference_line(line);
        if self.last_was_reference && !self.after_blank && unmarked {
            self.emit(Role::ReferenceContinuation(parse_reference(&body)));
        } else {
            self.emit(Role::Reference(parse_reference(&body)));
        }
    }

    fn note_rejected(&mut self, reason: &str) {
        let note = ClassificationDegraded::HeadingRejected {
            line: self.line_no,
            reason: reason.to_string(),
        };
        debug!("{}", note);
        self.degraded.push(note);
    }

    fn critique_rules(&mut self, line: &str) {
        if let Some(caps) = RE_MD_HEADING.captures(line) {
            let hashes = caps[1].len() as u8;
            let text = strip_emphasis(&caps[2]);
            self.heading(None, hashes.max(2), text.trim_end_matches(':').to_string());
            return;
        }
        if let Some(caps) = RE_NUMBERED_BOLD.captures(line) {
            let n = caps[1].parse().ok();
            let label = caps[2].trim().trim_end_matches(':').to_string();
            let text = strip_emphasis(&caps[3]);
            self.emit(Role::ListItem {
                number: n,
                label: Some(label),
                text,
            });
            return;
        }
        if let Some(caps) = RE_BOLD_LABEL.captures(line) {
            let label = caps[1].trim().to_string();
            let rest = caps[2].trim().to_string();
            self.heading(None, 2, label);
            if !rest.is_empty() {
                let text = strip_emphasis(&rest);
                self.emit(Role::Paragraph(text));
            }
            return;
        }
        let bare = strip_emphasis(line);
        let key = bare.trim_end_matches(':').trim().to_lowercase();
        if CRITIQUE_SECTIONS.contains(&key.as_str()) {
            self.heading(None, 2, bare.trim_end_matches(':').trim().to_string());
            return;
        }
        if let Some(caps) = RE_BULLET.captures(line) {
            self.list_item(None, &caps[1]);
            return;
        }
        if let Some(caps) = RE_ORDERED.captures(line) {
            let n = caps[1].parse().ok();
            self.list_item(n, &caps[2]);
            return;
        }
        self.paragraph(line);
    }

    fn question_rules(&mut self, line: &str) {
        if let Some(caps) = RE_MD_HEADING.captures(line) {
            let hashes = caps[1].len() as u8;
            let text = strip_emphasis(&caps[2]);
            self.heading(None, hashes, text);
            return;
        }
        if let Some(caps) = RE_ORDERED.captures(line) {
            let n = caps[1].parse().ok();
            let body = caps[2].to_string();
            let (label, text) = match RE_BOLD_LABEL.captures(&body) {
                Some(b) if !b[2].trim().is_empty() => {
                    (Some(b[1].trim().to_string()), strip_emphasis(&b[2]))
                }
                _ => (None, strip_emphasis(&body)),
            };
            self.emit(Role::ListItem {
                number: n,
                label,
                text,
            });
            return;
        }
        if let Some(caps) = RE_BULLET.captures(line) {
            let text = strip_emphasis(&caps[1]);
            self.emit(Role::ListItem {
                number: None,
                label: None,
                text,
            });
            return;
        }
        self.paragraph(line);
    }

    fn outline_rules(&mut self, line: &str) {
        let line = line.replace('*', "");
        let line = line.trim();
        if line.chars().count() < 3 || RE_BARE_NUMBER.is_match(line) {
            return;
        }

        if !self.title_seen && self.content_seen < 2 && RE_OUTLINE_TITLE.is_match(line) {
            self.title_seen = true;
            let title = RE_MD_HEADING.replace(line, "$2");
            self.emit(Role::Title(title.trim().trim_end_matches(':').to_string()));
            return;
        }
        if let Some(caps) = RE_CHAPTER.captures(line) {
            self.heading(None, 1, strip_emphasis(&caps[1]));
            return;
        }
        let unheaded = RE_MD_HEADING.replace(line, "$2").to_string();
        let key = unheaded.trim_end_matches(':').trim().to_lowercase();
        if OUTLINE_SECTIONS.contains(&key.as_str()) {
            self.heading(None, 1, unheaded.trim_end_matches(':').trim().to_string());
            return;
        }
        if let Some(caps) = RE_DOTTED.captures(&unheaded) {
            if let Some(n) = DottedNumber::parse(&caps[1]) {
                self.heading(Some(n), 1, strip_emphasis(&caps[2]));
                return;
            }
        }
        if let Some(caps) = RE_SPACED_ORDERED.captures(&unheaded) {
            let n: Option<u32> = caps[1].parse().ok();
            let title = strip_emphasis(&caps[2]);
            let major = OUTLINE_SECTIONS.contains(&title.trim_end_matches(':').to_lowercase().as_str());
            if major || title.chars().count() > 15 {
                self.heading(n.map(DottedNumber::from), 1, title);
            } else {
                self.emit(Role::ListItem {
                    number: n,
                    label: None,
                    text: title,
                });
            }
            return;
        }
        if let Some(caps) = RE_MD_HEADING.captures(line) {
            let hashes = caps[1].len() as u8;
            self.heading(None, hashes, strip_emphasis(&caps[2]));
            return;
        }
        if let Some(caps) = RE_BULLET.captures(line) {
            for item in split_dash_items(&caps[1]) {
                self.emit(Role::ListItem {
                    number: None,
                    label: None,
                    text: strip_emphasis(&item),
                });
            }
            return;
        }
        self.paragraph(line);
    }
}

static RE_NUMBERED_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\s+\*\*(.+?)\*\*:?\s*(.*)$").unwrap());

static RE_BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.?$").unwrap());

static RE_OUTLINE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:#{1,6}\s*)?Dissertation (?:Outline|Topic)\b").unwrap());

static RE_CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:#{1,6}\s*)?(Chapter\s+\d+\s*:.*)$").unwrap());

static RE_DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.\d+(?:\.\d+)*)\.?\s+(.+)$").unwrap());

static RE_SPACED_ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*\.\s+(.+)$").unwrap());

impl Iterator for Classifier<'_> {
    type Item = ClassifiedLine;

    fn next(&mut self) -> Option<ClassifiedLine> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }

            let (idx, raw_line) = self.lines.next()?;
            self.line_no = idx + 1;
            let line = raw_line.trim();

            if line.is_empty() {
                self.after_blank = true;
                continue;
            }
            if line.starts_with("```") {
                let code = self.consume_code();
                self.emit(Role::Code(code));
                self.content_seen += 1;
                continue;
            }
            if RE_RULE.is_match(line) {
                if self.mode == Mode::Toc {
                    self.mode = Mode::Default;
                }
                self.after_blank = true;
                continue;
            }
            if self.mode == Mode::Toc {
                if RE_TOC_ENTRY.is_match(line) {
                    continue;
                }
                self.mode = Mode::Default;
            }
            if RE_TOC_HEADING.is_match(line) {
                self.enter_toc();
                continue;
            }

            self.classify_line(line);
            self.content_seen += 1;
        }
    }
}

// ── Line predicates ──────────────────────────────────────────────────────

fn title_candidate(line: &str) -> Option<String> {
    if RE_ORDERED.is_match(line) {
        return None;
    }
    if let Some(rest) = line.strip_prefix("# ") {
        let text = strip_emphasis(rest);
        if RE_TITLE_PRODUCT.is_match(&text) {
            return Some(text);
        }
        let section_like = RE_NUMBERED.is_match(&text)
            || major_section_number(&text).is_some()
            || is_references_title(&text);
        return (!section_like && !text.is_empty() && text.chars().count() <= 150).then_some(text);
    }
    let text = strip_emphasis(line);
    let len = text.chars().count();
    ((30..=150).contains(&len) && RE_TITLE_PRODUCT.is_match(&text)).then_some(text)
}

fn is_references_title(text: &str) -> bool {
    let t = text.trim().trim_end_matches(':').to_lowercase();
    t == "references" || t == "bibliography" || t == "reference list"
}

/// Author–year shape: `[N. ]Surname, <initials> Year` or `Surname, Year.`.
fn is_reference_line(line: &str) -> bool {
    let unbold = strip_bold(line);
    let body = RE_BULLET.replace(&unbold, "$1");
    let Some(caps) = RE_REFERENCE_SHAPE.captures(&body) else {
        return false;
    };
    let between = caps.get(1).map_or("", |m| m.as_str()).trim();
    let after_year = caps.get(2).map_or("", |m| m.as_str());
    if between.is_empty() {
        // "Surname, 2020." but not "Overall, 2020 was".
        return matches!(after_year, "." | ")");
    }
    between == "(" || RE_INITIAL.is_match(between)
}

/// Node labels if the line is part of a diagram, else None.
fn flowchart_nodes(line: &str) -> Option<Vec<String>> {
    let has_arrow = line.contains(['↓', '→', '↑', '←', '⟶']) || line.contains("->");
    let has_label = RE_FLOW_LABEL.is_match(line);
    if !has_arrow && !has_label {
        return None;
    }

    let residue = RE_FLOW_LABEL.replace_all(line, "");
    let residue: String = residue
        .chars()
        .filter(|c| !c.is_whitespace() && !"↓→↑←⟶|-<>=v•*+".contains(*c))
        .collect();
    if residue.is_empty() {
        let nodes = RE_FLOW_LABEL
            .captures_iter(line)
            .map(|c| strip_emphasis(&c[1]))
            .filter(|n| !n.is_empty())
            .collect();
        return Some(nodes);
    }

    // `A → B → C` chains of short labels.
    if has_label || line.chars().count() > 200 {
        return None;
    }
    let segments: Vec<String> = RE_ARROW_SPLIT
        .split(line)
        .map(|s| strip_emphasis(s.trim_start_matches(['-', '•', '*', ' '])))
        .collect();
    let short = segments
        .iter()
        .all(|s| !s.is_empty() && s.split_whitespace().count() <= 6);
    (segments.len() >= 2 && short).then_some(segments)
}

fn is_component_description(line: &str, nodes: &[String]) -> bool {
    if RE_COMPONENT_DESCRIPTION.is_match(line) {
        return true;
    }
    let unmarked = strip_emphasis(&RE_BULLET.replace(line, "$1"));
    let Some((label, _)) = unmarked.split_once(':') else {
        return false;
    };
    let label = label.trim().to_lowercase();
    KNOWN_COMPONENTS.contains(&label.as_str()) || nodes.iter().any(|n| n.to_lowercase() == label)
}

/// Split `Label: description` when the label is short and capitalised.
fn split_label(body: &str, re: &Regex) -> (Option<String>, String) {
    match re.captures(body.trim()) {
        Some(caps) => (Some(caps[1].trim().to_string()), strip_emphasis(&caps[2])),
        None => (None, strip_emphasis(body)),
    }
}

/// `A - B - C` where each part starts with a capitalised word.
fn split_dash_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut rest = body;
    while let Some(pos) = rest.find(" - ") {
        let after = &rest[pos + 3..];
        let mut chars = after.chars();
        let capitalised = matches!(
            (chars.next(), chars.next()),
            (Some(a), Some(b)) if a.is_uppercase() && b.is_lowercase()
        );
        current.push_str(&rest[..pos]);
        if capitalised {
            items.push(std::mem::take(&mut current));
        } else {
            current.push_str(" - ");
        }
        rest = after;
    }
    current.push_str(rest);
    items.push(current);
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(raw: &str, kind: DocumentKind) -> Vec<Role> {
        classify(raw, kind).map(|l| l.role).collect()
    }

    fn heading(number: &str, text: &str) -> Role {
        let n = DottedNumber::parse(number).unwrap();
        Role::Heading {
            level: n.level(),
            number: Some(n),
            text: text.into(),
        }
    }

    #[test]
    fn numbered_heading_then_paragraph() {
        let r = roles("1. Introduction\nThis is the intro text.", DocumentKind::GenericReport);
        assert_eq!(
            r,
            vec![
                heading("1", "Introduction"),
                Role::Paragraph("This is the intro text.".into())
            ]
        );
    }

    #[test]
    fn dotted_heading_levels() {
        let r = roles("2.1 Background\n2.1.3 Deep Detail", DocumentKind::GenericReport);
        assert_eq!(r[0], heading("2.1", "Background"));
        assert_eq!(r[1], heading("2.1.3", "Deep Detail"));
    }

    #[test]
    fn bare_major_section_is_numbered() {
        let r = roles("Evaluation\nSome evaluation text.", DocumentKind::GenericReport);
        assert_eq!(r[0], heading("8", "Evaluation"));
    }

    #[test]
    fn bulleted_major_section_is_heading() {
        let r = roles("• Testing", DocumentKind::GenericReport);
        assert_eq!(r[0], heading("6", "Testing"));
    }

    #[test]
    fn reference_beats_heading() {
        let r = roles(
            "1. Smith, J., 2020. *Climate Effects*. Journal X, 1(2), pp.1-9. URL: https://doi.org/10.1/x",
            DocumentKind::GenericReport,
        );
        assert_eq!(r.len(), 1);
        assert!(matches!(&r[0], Role::Reference(p) if p.url.is_some()));
    }

    #[test]
    fn references_never_fire_for_questions() {
        let r = roles(
            "1. Smith, J., 2020. Climate Effects and what they mean for farms?",
            DocumentKind::ResearchQuestions,
        );
        assert!(matches!(&r[0], Role::ListItem { number: Some(1), .. }));
    }

    #[test]
    fn prose_with_comma_and_year_is_not_a_reference() {
        assert!(!is_reference_line(
            "Scalability, performance and security were evaluated in 2023 trials."
        ));
        assert!(is_reference_line("Doe, A. (2019) Cloud Systems. Press."));
        assert!(is_reference_line("Smith, 2020. Title."));
        assert!(is_reference_line("Smith, (2020) Title."));
    }

    #[test]
    fn comma_then_year_prose_stays_a_paragraph() {
        assert!(!is_reference_line("Overall, 2020 was a turning point for the industry."));
        let r = roles(
            "Overall, 2020 was a turning point for the industry.\nDemand recovered later.",
            DocumentKind::GenericReport,
        );
        assert_eq!(
            r,
            vec![
                Role::Paragraph("Overall, 2020 was a turning point for the industry.".into()),
                Role::Paragraph("Demand recovered later.".into()),
            ]
        );
    }

    #[test]
    fn flowchart_description_dropped() {
        let c: Vec<_> = classify(
            "[User Interface]\n↓\n[Database]\n• User Interface: This is the entry point.",
            DocumentKind::GenericReport,
        )
        .collect();
        let r: Vec<_> = c.into_iter().map(|l| l.role).collect();
        assert_eq!(
            r,
            vec![
                Role::Flowchart(vec!["User Interface".into()]),
                Role::Flowchart(vec![]),
                Role::Flowchart(vec!["Database".into()]),
            ]
        );
    }

    #[test]
    fn flowchart_state_transitions() {
        let mut c = classify(
            "[A]\n↓\n[B]\nFirst stray line.\nSecond stray line.\nThird.",
            DocumentKind::GenericReport,
        );
        c.next();
        assert_eq!(c.state(), ClassifierState::InFlowchart);
        c.next();
        c.next();
        c.next();
        assert_eq!(c.state(), ClassifierState::InFlowchart);
        c.next();
        assert_eq!(c.state(), ClassifierState::Default);
    }

    #[test]
    fn flowchart_ends_at_heading() {
        let mut c = classify("[A]\n5. Implementation", DocumentKind::GenericReport);
        c.next();
        assert_eq!(c.state(), ClassifierState::InFlowchart);
        c.next();
        assert_eq!(c.state(), ClassifierState::Default);
    }

    #[test]
    fn arrow_chain_is_flowchart() {
        assert_eq!(
            flowchart_nodes("Client → API Gateway → Database"),
            Some(vec!["Client".into(), "API Gateway".into(), "Database".into()])
        );
        assert_eq!(
            flowchart_nodes("The request flows from the browser through many services → and eventually lands in a store that keeps it"),
            None
        );
    }

    #[test]
    fn citation_brackets_are_not_flowcharts() {
        assert_eq!(flowchart_nodes("Studies show [1] that this works."), None);
    }

    #[test]
    fn subsection_state_and_repeated_prefix() {
        let mut c = classify(
            "6.1 Testing Strategies\n6. Unit Testing",
            DocumentKind::GenericReport,
        );
        c.next();
        assert_eq!(
            c.state(),
            ClassifierState::InSubsection(DottedNumber::parse("6.1").unwrap())
        );
        let item = c.next().unwrap();
        assert!(matches!(item.role, Role::ListItem { number: Some(6), .. }));
    }

    #[test]
    fn numbered_label_line_is_list_item() {
        let r = roles("6. Unit Testing: Each component is tested.", DocumentKind::GenericReport);
        assert_eq!(
            r[0],
            Role::ListItem {
                number: Some(6),
                label: Some("Unit Testing".into()),
                text: "Each component is tested.".into()
            }
        );
    }

    #[test]
    fn long_numbered_line_degrades_to_list_item() {
        let long = format!("3. {}", "word ".repeat(30));
        let mut c = classify(&long, DocumentKind::GenericReport);
        assert!(matches!(c.next().unwrap().role, Role::ListItem { .. }));
        assert_eq!(c.degradations().len(), 1);
    }

    #[test]
    fn title_and_abstract() {
        let raw = "ResearchAid AI Report: Distributed Systems Design\nAbstract\nWe study things.\n1. Introduction";
        let r = roles(raw, DocumentKind::GenericReport);
        assert!(matches!(&r[0], Role::Title(t) if t.starts_with("ResearchAid AI")));
        assert_eq!(r[1], Role::AbstractMarker);
        assert_eq!(r[2], Role::Paragraph("We study things.".into()));
        assert_eq!(r[3], heading("1", "Introduction"));
    }

    #[test]
    fn prose_starting_with_abstract_stays_a_paragraph() {
        let raw = "Abstract classes in Java are a useful tool.\n1. Introduction\nText.";
        let r = roles(raw, DocumentKind::GenericReport);
        assert_eq!(
            r,
            vec![
                Role::Paragraph("Abstract classes in Java are a useful tool.".into()),
                heading("1", "Introduction"),
                Role::Paragraph("Text.".into()),
            ]
        );
    }

    #[test]
    fn abstract_caption_with_inline_text() {
        let r = roles("**Abstract:** We study things.", DocumentKind::GenericReport);
        assert_eq!(r, vec![Role::AbstractMarker, Role::Paragraph("We study things.".into())]);
        let r = roles("## Abstract\nWe study things.", DocumentKind::GenericReport);
        assert_eq!(r[0], Role::AbstractMarker);
    }

    #[test]
    fn markdown_section_name_is_not_a_title() {
        let r = roles("# Introduction\nThe intro.", DocumentKind::GenericReport);
        assert_eq!(
            r,
            vec![heading("1", "Introduction"), Role::Paragraph("The intro.".into())]
        );
        let r = roles("# 2. Methods\nText.", DocumentKind::GenericReport);
        assert_eq!(r[0], heading("2", "Methods"));
        let r = roles("# Soil Carbon Under Cover Crops\nText.", DocumentKind::GenericReport);
        assert_eq!(r[0], Role::Title("Soil Carbon Under Cover Crops".into()));
    }

    #[test]
    fn toc_block_closed_by_rule_is_skipped() {
        let raw = "Table of Contents\n1. Introduction\n2. Literature Review\n---\n1. Introduction\nText.";
        let r = roles(raw, DocumentKind::GenericReport);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], heading("1", "Introduction"));
    }

    #[test]
    fn toc_dot_leaders_skipped_without_rule() {
        let raw = "Contents\n1. Introduction ........ 1\n2. Methods ........ 4\n\nBody text that is long enough to not look like an entry at all, really.";
        let r = roles(raw, DocumentKind::GenericReport);
        assert_eq!(r.len(), 1);
        assert!(matches!(&r[0], Role::Paragraph(_)));
    }

    #[test]
    fn code_fence_is_one_block() {
        let r = roles("```rust\nfn main() {}\n\nlet x = 1;\n```\nAfter.", DocumentKind::GenericReport);
        assert_eq!(r[0], Role::Code("fn main() {}\n\nlet x = 1;".into()));
        assert_eq!(r[1], Role::Paragraph("After.".into()));
    }

    #[test]
    fn references_section_collects_entries_and_continuations() {
        let raw = "10. References\n1. World Health Organization (2021) Global report.\nAvailable at: https://who.int/r\n2. Doe, A. (2019) Cloud.";
        let r = roles(raw, DocumentKind::GenericReport);
        assert_eq!(r[0], heading("10", "References"));
        assert!(matches!(&r[1], Role::Reference(_)));
        assert!(matches!(&r[2], Role::ReferenceContinuation(p) if p.url.as_deref() == Some("https://who.int/r")));
        assert!(matches!(&r[3], Role::Reference(_)));
    }

    #[test]
    fn summary_strips_structure() {
        let r = roles("## Heading\n- **bold** point", DocumentKind::Summary);
        assert_eq!(
            r,
            vec![
                Role::Paragraph("Heading".into()),
                Role::Paragraph("bold point".into())
            ]
        );
    }

    #[test]
    fn critique_bold_labels() {
        let r = roles(
            "**Strengths:** Clear method.\n1. **Sampling**: Too small.",
            DocumentKind::Critique,
        );
        assert_eq!(
            r[0],
            Role::Heading {
                number: None,
                level: 2,
                text: "Strengths".into()
            }
        );
        assert_eq!(r[1], Role::Paragraph("Clear method.".into()));
        assert_eq!(
            r[2],
            Role::ListItem {
                number: Some(1),
                label: Some("Sampling".into()),
                text: "Too small.".into()
            }
        );
    }

    #[test]
    fn outline_rules() {
        let raw = "Dissertation Outline: Edge AI\nChapter 1: Introduction\n1.1 Background\n- Context - Motivation\n2. Aims";
        let r = roles(raw, DocumentKind::DissertationOutline);
        assert_eq!(r[0], Role::Title("Dissertation Outline: Edge AI".into()));
        assert!(matches!(&r[1], Role::Heading { number: None, level: 1, text } if text == "Chapter 1: Introduction"));
        assert_eq!(r[2], heading("1.1", "Background"));
        assert!(matches!(&r[3], Role::ListItem { text, .. } if text == "Context"));
        assert!(matches!(&r[4], Role::ListItem { text, .. } if text == "Motivation"));
        assert!(matches!(&r[5], Role::ListItem { number: Some(2), .. }));
    }

    #[test]
    fn blank_lines_are_tracked() {
        let lines: Vec<_> = classify("One.\n\nTwo.", DocumentKind::GenericReport).collect();
        assert!(!lines[0].after_blank);
        assert!(lines[1].after_blank);
        assert_eq!(lines[1].line_no, 3);
    }

    #[test]
    fn split_dash_keeps_lowercase_hyphen_phrases() {
        assert_eq!(
            split_dash_items("State - of - the art - Review"),
            vec!["State - of - the art".to_string(), "Review".to_string()]
        );
    }
}
