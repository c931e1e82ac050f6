//! Post-processing: deterministic cleanup of model-generated academic text.
//!
//! Language models follow formatting instructions loosely. Even with a
//! prompt that forbids it, a report comes back wrapped in fences, with
//! `**bold**` section titles, bulleted chapter names or Windows line
//! endings. The classifier copes with most of this, but the text returned
//! to callers (and stored for later export) should already read cleanly.
//!
//! Two entry points:
//!
//! * [`clean_generated_text`] runs the format-agnostic rules on any model
//!   output.
//! * [`clean_report`] adds the report rules on top: numbered headings lose
//!   their bold, chapter names are numbered, label lead-ins are unbolded.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything looks at lines. Fences are
//! stripped first so the heading rules see the real first line. Blank-line
//! collapsing and the final newline run last because earlier rules may
//! insert or remove lines.

use crate::pipeline::classify::major_section_number;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply the format-agnostic rules to raw model output.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Collapse 3+ consecutive blank lines down to 1
/// 6. Ensure the text ends with exactly one newline
pub fn clean_generated_text(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Apply every rule for structured reports and assignment responses.
///
/// Runs [`clean_generated_text`] plus:
/// 7. Strip bold from numbered headings (`2.1 **Scope**` → `2.1 Scope`)
/// 8. Number bulleted chapter names (`• Evaluation` → `8. Evaluation`)
/// 9. Number bare chapter names that start a section
/// 10. Unbold label lead-ins (`**Scope:**` → `Scope:`)
/// 11. Separate the abstract marker from its body
pub fn clean_report(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = unbold_numbered_headings(&s);
    let s = number_bulleted_sections(&s);
    let s = number_bare_sections(&s);
    let s = unbold_labels(&s);
    let s = separate_abstract(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 6: Ensure text ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Rule 7: Strip bold from numbered headings ────────────────────────────────

static RE_BOLD_NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(#{1,4}\s+)?(\d+(?:\.\d+)*\.?)\s+\*\*(.+?)\*\*[ \t]*$").unwrap()
});

static RE_BOLD_NUMBER_INSIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\*\*(\d+(?:\.\d+)*\.?)\s+(.+?)\*\*[ \t]*$").unwrap());

fn unbold_numbered_headings(input: &str) -> String {
    let s = RE_BOLD_NUMBERED.replace_all(input, "${1}${2} ${3}");
    RE_BOLD_NUMBER_INSIDE
        .replace_all(&s, "${1} ${2}")
        .to_string()
}

// ── Rule 8: Number bulleted chapter names ────────────────────────────────────

static RE_BULLETED_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\-*+•]\s+(?:\*\*)?([A-Za-z][A-Za-z /&]+?)(?:\*\*)?:?$").unwrap());

fn number_bulleted_sections(input: &str) -> String {
    input
        .lines()
        .map(|line| {
            RE_BULLETED_SECTION
                .captures(line.trim())
                .and_then(|caps| {
                    let name = caps[1].trim();
                    major_section_number(name).map(|n| format!("{n}. {name}"))
                })
                .unwrap_or_else(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 9: Number bare chapter names ───────────────────────────────────────
//
// A chapter name alone on a line is a heading only when it starts a section:
// the previous line is blank, closes a sentence, or is itself numbered.

static RE_NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s").unwrap());

fn number_bare_sections(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in input.lines() {
        let trimmed = line.trim();
        let name = trimmed.trim_end_matches(':');
        let starts_section = match out.last() {
            None => true,
            Some(prev) => {
                let prev = prev.trim();
                prev.is_empty() || prev.ends_with('.') || RE_NUMBERED_LINE.is_match(prev)
            }
        };
        match major_section_number(name) {
            Some(n) if starts_section && !name.is_empty() => out.push(format!("{n}. {name}")),
            _ => out.push(line.to_string()),
        }
    }
    out.join("\n")
}

// ── Rule 10: Unbold label lead-ins ───────────────────────────────────────────

static RE_BOLD_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([A-Z][A-Za-z0-9 /&()\-]{0,60}?):\*\*").unwrap());

fn unbold_labels(input: &str) -> String {
    RE_BOLD_LABEL.replace_all(input, "${1}:").to_string()
}

// ── Rule 11: Separate the abstract marker from its body ─────────────────────

static RE_ABSTRACT_INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(?:\*\*)?abstract(?:\*\*)?(?::(?:\*\*)?[ \t]*\n?|[ \t]*\n)([^\n])").unwrap());

fn separate_abstract(input: &str) -> String {
    RE_ABSTRACT_INLINE
        .replacen(input, 1, "Abstract\n\n${1}")
        .to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n1. Introduction\nText\n```";
        assert_eq!(strip_markdown_fences(input), "1. Introduction\nText");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_markdown_fences("Plain"), "Plain");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hi   \nthere  "), "  hi\nthere");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("x"), "x\n");
        assert_eq!(ensure_final_newline("x\n\n\n"), "x\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_markdown_links_pass_through() {
        let text = "See ![Figure 1](fig1.png) and [the survey](https://example.org).";
        assert_eq!(clean_generated_text(text), format!("{text}\n"));
    }

    #[test]
    fn test_unbold_numbered_headings() {
        assert_eq!(unbold_numbered_headings("2.1 **Scope**"), "2.1 Scope");
        assert_eq!(unbold_numbered_headings("## 3. **Method**"), "## 3. Method");
        assert_eq!(unbold_numbered_headings("**4. Design**"), "4. Design");
        assert_eq!(unbold_numbered_headings("Text **bold** here"), "Text **bold** here");
    }

    #[test]
    fn test_number_bulleted_sections() {
        assert_eq!(number_bulleted_sections("• Evaluation"), "8. Evaluation");
        assert_eq!(number_bulleted_sections("- **Conclusion**"), "9. Conclusion");
        assert_eq!(number_bulleted_sections("- Something else"), "- Something else");
    }

    #[test]
    fn test_number_bare_sections_only_at_section_start() {
        let out = number_bare_sections("Body text.\nTesting\nMore.");
        assert_eq!(out, "Body text.\n6. Testing\nMore.");
        let out = number_bare_sections("We focus on\nTesting\nin depth.");
        assert!(!out.contains("6. Testing"), "{}", out);
    }

    #[test]
    fn test_unbold_labels() {
        assert_eq!(unbold_labels("**Scalability:** grows"), "Scalability: grows");
    }

    #[test]
    fn test_separate_abstract() {
        assert_eq!(separate_abstract("**Abstract:** We study"), "Abstract\n\nWe study");
        assert_eq!(separate_abstract("Abstract\nWe study"), "Abstract\n\nWe study");
        assert_eq!(separate_abstract("Abstraction helps."), "Abstraction helps.");
    }

    #[test]
    fn test_clean_generated_text_keeps_paragraph_breaks() {
        let out = clean_generated_text("First para.\r\n\r\nSecond para.   \n\n\n\n");
        assert_eq!(out, "First para.\n\nSecond para.\n");
    }

    #[test]
    fn test_clean_report_full_pipeline() {
        let input = "```\nTitle Of Report\n\n1. **Introduction**\nText **Scope:** here.\n\n• Conclusion\n```";
        let out = clean_report(input);
        assert!(out.contains("1. Introduction\n"), "{}", out);
        assert!(out.contains("Scope: here."), "{}", out);
        assert!(out.contains("9. Conclusion"), "{}", out);
        assert!(!out.contains("```"));
        assert!(out.ends_with('\n'));
    }
}
