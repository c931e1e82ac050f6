//! Inline cleanup: emphasis, links and reference-entry dissection.
//!
//! Model output carries markdown emphasis that must never reach a renderer
//! as raw syntax. Everything here is a pure `&str → String` pass; the
//! classifier calls it on the captured text of each line.

use crate::model::Span;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Emphasis ─────────────────────────────────────────────────────────────

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());

static RE_BOLD_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.+?)__").unwrap());

static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+?)\*").unwrap());

static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

static RE_MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\([^)\s]+\)").unwrap());

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Remove bold markers only, keeping italics.
pub fn strip_bold(s: &str) -> String {
    let s = RE_BOLD.replace_all(s, "$1");
    RE_BOLD_UNDERSCORE.replace_all(&s, "$1").into_owned()
}

/// Remove every emphasis marker, inline code tick and markdown link
/// wrapper. No `*` survives.
pub fn strip_emphasis(s: &str) -> String {
    let s = strip_bold(s);
    let s = RE_ITALIC.replace_all(&s, "$1");
    let s = RE_INLINE_CODE.replace_all(&s, "$1");
    let s = RE_MD_LINK.replace_all(&s, "$1");
    let s = s.replace('*', "");
    RE_SPACES.replace_all(s.trim(), " ").into_owned()
}

// ── References ───────────────────────────────────────────────────────────

/// A reference entry split into display text, italic span and link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceParts {
    pub raw: String,
    pub title: Option<Span>,
    pub url: Option<String>,
}

static RE_ONLINE_AVAILABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*\[online\]\.?\s*Available\s+(?:at|from):?\s*<?(https?://[^\s>]+)>?\.?(?:\s*\[Accessed[^\]]*\]\.?)?",
    )
    .unwrap()
});

static RE_LABELLED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*(?:URL|Available\s+(?:at|from)|Retrieved\s+from|doi)\s*:?\s*<?(https?://[^\s>]+)>?",
    )
    .unwrap()
});

static RE_ANGLE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*<(https?://[^>\s]+)>").unwrap());

static RE_PAREN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\((https?://[^)\s]+)\)").unwrap());

static RE_BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(https?://[^\s)>\]]+)").unwrap());

static RE_ACCESSED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*\[Accessed[^\]]*\]\.?").unwrap());

static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,;])").unwrap());

static RE_DOUBLE_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}$").unwrap());

static RE_YEAR_THEN_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:1[5-9]|20)\d{2}[a-z]?\)?[.,]?\s+([^.]+?)\.(?:\s|$)").unwrap()
});

/// Split a reference line into display text, italic title span and URL.
///
/// The URL is removed from the display text (first one found is kept for
/// link generation). The title span is the first `*italic*` run, or
/// failing that the sentence after the year.
pub fn parse_reference(line: &str) -> ReferenceParts {
    let text = strip_bold(line.trim());

    let mut url = None;
    let mut text = text;
    for re in [
        &*RE_ONLINE_AVAILABLE,
        &*RE_LABELLED_URL,
        &*RE_ANGLE_URL,
        &*RE_PAREN_URL,
        &*RE_BARE_URL,
    ] {
        if url.is_none() {
            url = re
                .captures(&text)
                .map(|c| c[1].trim_end_matches(['.', ',', ';']).to_string());
        }
        text = re.replace_all(&text, "").into_owned();
    }
    let text = RE_ACCESSED.replace_all(&text, "");
    let text = RE_SPACES.replace_all(&text, " ");
    let text = RE_SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = RE_DOUBLE_PERIOD.replace(text.trim(), ".").into_owned();

    let (raw, mut title) = extract_italic_span(&text);
    if title.is_none() {
        title = RE_YEAR_THEN_TITLE
            .captures(&raw)
            .and_then(|c| c.get(1))
            .map(|m| Span {
                start: m.start(),
                end: m.end(),
            });
    }

    ReferenceParts { raw, title, url }
}

/// Remove `*…*` / `_…_` markers, returning the span of the first italic run.
/// Any stray `*` left over is dropped and the span shifted accordingly.
fn extract_italic_span(text: &str) -> (String, Option<Span>) {
    static RE_ANY_ITALIC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*[^*\s])?)\*|\b_([^_\n]+?)_\b").unwrap());

    let mut out = String::with_capacity(text.len());
    let mut span = None;
    let mut last = 0;
    for caps in RE_ANY_ITALIC.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let start = out.len();
        out.push_str(inner.as_str());
        if span.is_none() {
            span = Some(Span {
                start,
                end: out.len(),
            });
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);

    if !out.contains('*') {
        return (out, span);
    }

    let mut cleaned = String::with_capacity(out.len());
    let mut shifted = span;
    for (i, ch) in out.char_indices() {
        if ch == '*' {
            if let Some(s) = shifted.as_mut() {
                if i < span.map_or(0, |o| o.start) {
                    s.start -= 1;
                    s.end -= 1;
                } else if i < span.map_or(0, |o| o.end) {
                    s.end -= 1;
                }
            }
            continue;
        }
        cleaned.push(ch);
    }
    (cleaned, shifted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bold_and_italics() {
        assert_eq!(
            strip_emphasis("A **bold** and *italic* and __under__ word"),
            "A bold and italic and under word"
        );
    }

    #[test]
    fn strips_residual_asterisks() {
        assert_eq!(strip_emphasis("dangling ** marker * here"), "dangling marker here");
    }

    #[test]
    fn strips_links_and_code() {
        assert_eq!(
            strip_emphasis("See [the docs](https://x.org) and `cargo`"),
            "See the docs and cargo"
        );
    }

    #[test]
    fn reference_url_label_removed() {
        let r = parse_reference(
            "1. Smith, J., 2020. *Climate Effects*. Journal X, 1(2), pp.1-9. URL: https://doi.org/10.1/x",
        );
        assert_eq!(r.url.as_deref(), Some("https://doi.org/10.1/x"));
        assert!(!r.raw.contains("http"), "raw: {}", r.raw);
        assert!(!r.raw.contains("URL"), "raw: {}", r.raw);
        assert!(!r.raw.contains('*'));
        let span = r.title.unwrap();
        assert_eq!(&r.raw[span.range()], "Climate Effects");
        assert!(r.raw.ends_with("pp.1-9."), "raw: {}", r.raw);
    }

    #[test]
    fn reference_harvard_online() {
        let r = parse_reference(
            "Doe, A. (2019) Cloud Systems. [online] Available at: <https://example.com/cloud> [Accessed 1 May 2024].",
        );
        assert_eq!(r.url.as_deref(), Some("https://example.com/cloud"));
        assert!(!r.raw.contains("Available"));
        assert!(!r.raw.contains("Accessed"));
        assert_eq!(r.raw, "Doe, A. (2019) Cloud Systems.");
        assert_eq!(&r.raw[r.title.unwrap().range()], "Cloud Systems");
    }

    #[test]
    fn reference_title_falls_back_to_sentence_after_year() {
        let r = parse_reference("Smith, J., 2020. Climate Effects. Journal X.");
        let span = r.title.unwrap();
        assert_eq!(&r.raw[span.range()], "Climate Effects");
        assert!(r.url.is_none());
    }

    #[test]
    fn reference_bold_is_removed() {
        let r = parse_reference("**Brown, K., 2018.** *Deep Nets*. Press.");
        assert!(!r.raw.contains("**"));
        assert_eq!(&r.raw[r.title.unwrap().range()], "Deep Nets");
    }

    #[test]
    fn stray_asterisk_shifts_span() {
        let (raw, span) = extract_italic_span("x * y *Title* z");
        assert_eq!(raw, "x  y Title z");
        assert_eq!(&raw[span.unwrap().range()], "Title");
    }
}
