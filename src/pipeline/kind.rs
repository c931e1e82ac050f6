//! Document-kind detection.
//!
//! Runs once per document, before classification. Checks are made in a
//! fixed priority order (critique, outline, questions, summary) and the
//! first match wins; anything unmatched is a [`DocumentKind::GenericReport`].

use crate::config::KindThresholds;
use crate::model::DocumentKind;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_CRITIQUE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\*\*(?:Summary of Main Arguments:|Strengths:|Weaknesses|Critical Analysis:|Suggestions for Improvement:)",
    )
    .unwrap()
});

static RE_ASSIGNMENT_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)Requirements Analysis|System Architecture|Implementation|Testing|Deployment|Evaluation|Assignment Response|Assignment Brief",
    )
    .unwrap()
});

static RE_DISSERTATION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Chapter\s+\d+:|Dissertation Outline|Dissertation Topic|Research Field").unwrap()
});

static RE_CHAPTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Chapter\s+\d+:").unwrap());

static RE_OUTLINE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Dissertation Outline:").unwrap());

static RE_SUBSECTION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\d+\.\d+\s+").unwrap());

static RE_QUESTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\d+\.\s+[A-Z][^0-9\n]{20,}").unwrap());

static RE_REFERENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\d+\.\s+[A-Z][a-z]+,\s*(?:[A-Z]\.\s*,?\s*)*\(?\d{4}").unwrap());

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\d+(?:\.\d+)*\.?\s+[A-Z]").unwrap());

static RE_MARKDOWN_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s").unwrap());

static RE_BOLD_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\*\*[^*\n]+:\*\*").unwrap());

static RE_NUMBERED_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s").unwrap());

/// Detect the kind of a raw document.
pub fn detect_kind(raw: &str, thresholds: &KindThresholds) -> DocumentKind {
    let kind = if is_critique(raw) {
        DocumentKind::Critique
    } else if is_outline(raw) {
        DocumentKind::DissertationOutline
    } else if is_questions(raw, thresholds) {
        DocumentKind::ResearchQuestions
    } else if is_summary(raw, thresholds) {
        DocumentKind::Summary
    } else {
        DocumentKind::GenericReport
    };
    debug!("Detected document kind: {} ({} chars)", kind, raw.len());
    kind
}

fn is_critique(raw: &str) -> bool {
    RE_CRITIQUE_MARKER.is_match(raw)
}

fn is_outline(raw: &str) -> bool {
    !RE_ASSIGNMENT_KEYWORD.is_match(raw)
        && RE_DISSERTATION_KEYWORD.is_match(raw)
        && (RE_SUBSECTION_LINE.is_match(raw)
            || RE_OUTLINE_LABEL.is_match(raw)
            || RE_CHAPTER.is_match(raw))
}

fn is_questions(raw: &str, thresholds: &KindThresholds) -> bool {
    RE_QUESTION_LINE.is_match(raw)
        && !RE_REFERENCE_LINE.is_match(raw)
        && raw.len() < thresholds.questions_max_chars
        && !RE_SUBSECTION_LINE.is_match(raw)
}

fn is_summary(raw: &str, thresholds: &KindThresholds) -> bool {
    raw.len() < thresholds.summary_max_chars
        && !RE_NUMBERED_HEADING.is_match(raw)
        && !RE_MARKDOWN_HEADER.is_match(raw)
        && !RE_BOLD_LABEL.is_match(raw)
        && !RE_NUMBERED_LIST.is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(raw: &str) -> DocumentKind {
        detect_kind(raw, &KindThresholds::default())
    }

    #[test]
    fn critique_markers_win() {
        let raw = "**Summary of Main Arguments:** The paper argues...\n\n1. A numbered question about something long?";
        assert_eq!(detect(raw), DocumentKind::Critique);
    }

    #[test]
    fn outline_needs_dissertation_keyword_and_structure() {
        let raw = "Dissertation Outline:\n\nChapter 1: Introduction\n1.1 Background\n1.2 Aims";
        assert_eq!(detect(raw), DocumentKind::DissertationOutline);
    }

    #[test]
    fn outline_rejected_when_assignment_keywords_present() {
        let raw = "Chapter 1: Introduction\n1.1 Background\n\n5. Implementation\nDetails.";
        assert_ne!(detect(raw), DocumentKind::DissertationOutline);
    }

    #[test]
    fn numbered_questions() {
        let raw = "1. How does remote work affect team cohesion in startups?\n\
                   2. What role does asynchronous communication play in productivity?";
        assert_eq!(detect(raw), DocumentKind::ResearchQuestions);
    }

    #[test]
    fn short_heading_is_not_a_question() {
        assert_eq!(
            detect("1. Introduction\nThis is the intro text."),
            DocumentKind::GenericReport
        );
    }

    #[test]
    fn reference_lines_block_questions() {
        let raw = "1. Smith, J., 2020. A very long title about climate research effects.";
        assert_ne!(detect(raw), DocumentKind::ResearchQuestions);
    }

    #[test]
    fn unstructured_short_text_is_summary() {
        let raw = "This paper studies the effect of climate change on crops.\n\nIt finds a decline.";
        assert_eq!(detect(raw), DocumentKind::Summary);
    }

    #[test]
    fn long_unstructured_text_is_generic() {
        let raw = "word ".repeat(1200);
        assert_eq!(detect(&raw), DocumentKind::GenericReport);
    }

    #[test]
    fn thresholds_are_configurable() {
        let raw = "Plain prose only.";
        let tight = KindThresholds {
            summary_max_chars: 5,
            questions_max_chars: 10,
        };
        assert_eq!(detect_kind(raw, &tight), DocumentKind::GenericReport);
    }
}
