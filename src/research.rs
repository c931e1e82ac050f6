//! Research-assistant operations built on a [`CompletionOracle`].
//!
//! Each operation validates its input, truncates it to a per-operation cap,
//! makes one call (three for assignment responses) and returns a small
//! serialisable result. Nothing is retried: an oracle failure surfaces
//! verbatim as [`DocGenError::Oracle`].
//!
//! | Operation | temperature | max tokens | input cap |
//! |-----------|-------------|-----------|-----------|
//! | [`summarize_paper`](ResearchAssistant::summarize_paper) | 0.3 | 1000 | 12 000 |
//! | [`research_questions`](ResearchAssistant::research_questions) | 0.7 | 1000 | 8 000 |
//! | [`critique_arguments`](ResearchAssistant::critique_arguments) | 0.4 | 2000 | 12 000 |
//! | [`citation`](ResearchAssistant::citation) | 0.2 | 500 | none |
//! | [`dissertation_outline`](ResearchAssistant::dissertation_outline) | 0.5 | 2000 | none |
//! | [`research_report`](ResearchAssistant::research_report) | 0.5 | 4096 | 8 000 |
//! | [`assignment_response`](ResearchAssistant::assignment_response) | 0.8 / 0.8 / 0.7 | 4000 | 15 000 |
//!
//! A temperature set on [`DocGenConfig`] overrides every value above.

use crate::config::DocGenConfig;
use crate::error::DocGenError;
use crate::model::SectionEntry;
use crate::oracle::llm::ProviderOracle;
use crate::oracle::{CompletionOracle, CompletionRequest};
use crate::pipeline::postprocess::{clean_generated_text, clean_report};
use crate::prompts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const SUMMARY_INPUT_CAP: usize = 12_000;
pub const QUESTIONS_INPUT_CAP: usize = 8_000;
pub const CRITIQUE_INPUT_CAP: usize = 12_000;
pub const REPORT_INPUT_CAP: usize = 8_000;
pub const ASSIGNMENT_INPUT_CAP: usize = 15_000;

pub const MIN_REPORT_WORDS: usize = 500;
pub const MAX_REPORT_WORDS: usize = 5_000;

pub const DEFAULT_FIELD: &str = "Computer Science";

// ── Results ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub summary: String,
    /// Words in the input paper.
    pub word_count: usize,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuestions {
    pub questions: String,
    /// Numbered items in the response.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub critique: String,
    /// Words in the input paper.
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub citation: String,
    pub style: CitationStyle,
    pub paper_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissertationOutline {
    pub outline: String,
    pub topic: String,
    pub field: String,
}

/// A generated long-form document: research report or assignment response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub response: String,
    /// Words in the cleaned response.
    pub word_count: usize,
    pub model: String,
    pub sections: Vec<SectionEntry>,
}

/// Reference styles understood by [`ResearchAssistant::citation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CitationStyle {
    #[default]
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    Harvard,
    Chicago,
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CitationStyle::Apa => "APA",
            CitationStyle::Mla => "MLA",
            CitationStyle::Harvard => "Harvard",
            CitationStyle::Chicago => "Chicago",
        })
    }
}

impl FromStr for CitationStyle {
    type Err = DocGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apa" => Ok(CitationStyle::Apa),
            "mla" => Ok(CitationStyle::Mla),
            "harvard" => Ok(CitationStyle::Harvard),
            "chicago" => Ok(CitationStyle::Chicago),
            other => Err(DocGenError::InvalidInput {
                reason: format!("unknown citation style '{other}' (expected APA, MLA, Harvard or Chicago)"),
            }),
        }
    }
}

// ── Assistant ────────────────────────────────────────────────────────────

/// Entry point for every generation operation.
#[derive(Clone)]
pub struct ResearchAssistant {
    oracle: Arc<dyn CompletionOracle>,
    config: DocGenConfig,
}

impl fmt::Debug for ResearchAssistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchAssistant")
            .field("oracle", &self.oracle.model())
            .field("config", &self.config)
            .finish()
    }
}

impl ResearchAssistant {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: DocGenConfig) -> Self {
        Self { oracle, config }
    }

    /// Build the default provider-backed oracle from `config`.
    pub fn from_config(config: DocGenConfig) -> Result<Self, DocGenError> {
        let oracle = ProviderOracle::from_config(&config)?;
        Ok(Self::new(Arc::new(oracle), config))
    }

    pub fn config(&self) -> &DocGenConfig {
        &self.config
    }

    pub fn model(&self) -> String {
        self.oracle.model()
    }

    pub(crate) fn oracle(&self) -> &Arc<dyn CompletionOracle> {
        &self.oracle
    }

    /// A request with the operation's sampling values, or the configured
    /// temperature when one is set.
    pub(crate) fn request(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> CompletionRequest {
        CompletionRequest::new(system, user)
            .temperature(self.config.temperature.unwrap_or(temperature))
            .max_tokens(max_tokens)
    }

    async fn call(&self, operation: &str, request: CompletionRequest) -> Result<String, DocGenError> {
        let start = Instant::now();
        debug!(
            "{}: calling {} (temperature {}, max_tokens {})",
            operation,
            self.oracle.model(),
            request.temperature,
            request.max_tokens
        );
        let text = self.oracle.complete(request).await?;
        info!(
            "{}: {} chars in {}ms",
            operation,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }

    /// A paragraph-only overview of a paper.
    pub async fn summarize_paper(&self, text: &str) -> Result<PaperSummary, DocGenError> {
        require("paper text", text)?;
        let req = self.request(
            prompts::SUMMARY_SYSTEM,
            prompts::summary_user(truncate_chars(text, SUMMARY_INPUT_CAP)),
            0.3,
            1000,
        );
        let summary = clean_generated_text(&self.call("summarize_paper", req).await?);
        Ok(PaperSummary {
            summary,
            word_count: word_count(text),
            model: self.model(),
        })
    }

    /// Research questions from a paper, or from a topic when one is given.
    pub async fn research_questions(
        &self,
        text: Option<&str>,
        topic: Option<&str>,
    ) -> Result<ResearchQuestions, DocGenError> {
        let text = text.filter(|t| !t.trim().is_empty());
        let topic = topic.filter(|t| !t.trim().is_empty());
        if text.is_none() && topic.is_none() {
            return Err(DocGenError::InvalidInput {
                reason: "either paper text or a topic is required".into(),
            });
        }
        let paper = text.map(|t| truncate_chars(t, QUESTIONS_INPUT_CAP));
        let req = self.request(prompts::QUESTIONS_SYSTEM, prompts::questions_user(paper, topic), 0.7, 1000);
        let questions = clean_generated_text(&self.call("research_questions", req).await?);
        let count = count_numbered_items(&questions);
        Ok(ResearchQuestions { questions, count })
    }

    /// A sectioned critique of a paper's arguments.
    pub async fn critique_arguments(&self, text: &str) -> Result<Critique, DocGenError> {
        require("paper text", text)?;
        let req = self.request(
            prompts::CRITIQUE_SYSTEM,
            prompts::critique_user(truncate_chars(text, CRITIQUE_INPUT_CAP)),
            0.4,
            2000,
        );
        let critique = clean_generated_text(&self.call("critique_arguments", req).await?);
        Ok(Critique {
            critique,
            word_count: word_count(text),
        })
    }

    /// A formatted citation for the paper described by `paper_info`.
    pub async fn citation(
        &self,
        paper_info: serde_json::Value,
        style: CitationStyle,
    ) -> Result<Citation, DocGenError> {
        let empty = match &paper_info {
            serde_json::Value::Null => true,
            serde_json::Value::Object(m) => m.is_empty(),
            serde_json::Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if empty {
            return Err(DocGenError::InvalidInput {
                reason: "paper information is required".into(),
            });
        }
        let info = serde_json::to_string_pretty(&paper_info)
            .map_err(|e| DocGenError::Internal(format!("paper info serialisation: {}", e)))?;
        let style_name = style.to_string();
        let req = self.request(
            prompts::citation_system(&style_name),
            prompts::citation_user(&style_name, &info),
            0.2,
            500,
        );
        let citation = clean_generated_text(&self.call("citation", req).await?);
        Ok(Citation {
            citation,
            style,
            paper_info,
        })
    }

    /// A chaptered dissertation outline. `field` defaults to
    /// [`DEFAULT_FIELD`].
    pub async fn dissertation_outline(
        &self,
        topic: &str,
        field: Option<&str>,
    ) -> Result<DissertationOutline, DocGenError> {
        require("topic", topic)?;
        let field = field
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FIELD);
        let req = self.request(prompts::OUTLINE_SYSTEM, prompts::outline_user(topic.trim(), field), 0.5, 2000);
        let outline = clean_generated_text(&self.call("dissertation_outline", req).await?);
        Ok(DissertationOutline {
            outline,
            topic: topic.trim().to_string(),
            field: field.to_string(),
        })
    }

    /// A referenced academic report on `query`.
    ///
    /// `word_count` defaults to the configured target and is clamped to
    /// 500..=5000.
    pub async fn research_report(
        &self,
        query: &str,
        word_count_target: Option<usize>,
    ) -> Result<GeneratedReport, DocGenError> {
        let req = self.report_request(query, word_count_target)?;
        let raw = self.call("research_report", req).await?;
        Ok(self.finish_report(&raw))
    }

    pub(crate) fn report_request(
        &self,
        query: &str,
        word_count_target: Option<usize>,
    ) -> Result<CompletionRequest, DocGenError> {
        require("query", query)?;
        let words = clamp_report_words(word_count_target.unwrap_or(self.config.report_word_count));
        Ok(self.request(
            prompts::REPORT_SYSTEM,
            prompts::report_user(truncate_chars(query, REPORT_INPUT_CAP), words),
            0.5,
            4096,
        ))
    }

    pub(crate) fn finish_report(&self, raw: &str) -> GeneratedReport {
        let response = clean_report(raw);
        GeneratedReport {
            word_count: word_count(&response),
            sections: extract_sections(&response),
            model: self.model(),
            response,
        }
    }

    /// A full assignment response written in three sequential parts.
    ///
    /// Parts are joined with blank lines and cleaned as one document.
    /// Progress is reported per part when a callback is configured.
    pub async fn assignment_response(&self, brief: &str) -> Result<GeneratedReport, DocGenError> {
        require("assignment brief", brief)?;
        let brief = truncate_chars(brief, ASSIGNMENT_INPUT_CAP);

        let parts = [
            (prompts::ASSIGNMENT_PART1_SYSTEM, prompts::assignment_part1_user(brief), 0.8),
            (prompts::ASSIGNMENT_PART2_SYSTEM, prompts::assignment_part2_user(brief), 0.8),
            (prompts::ASSIGNMENT_PART3_SYSTEM, prompts::assignment_part3_user(brief), 0.7),
        ];
        let total = parts.len();
        let mut texts = Vec::with_capacity(total);

        for (i, (system, user, temperature)) in parts.into_iter().enumerate() {
            let part = i + 1;
            if let Some(cb) = &self.config.progress_callback {
                cb.on_part_start(part, total);
            }
            let req = self.request(system, user, temperature, 4000);
            let text = self.call(&format!("assignment_response part {}/{}", part, total), req).await?;
            if let Some(cb) = &self.config.progress_callback {
                cb.on_part_complete(part, total, text.len());
            }
            texts.push(text.trim().to_string());
        }

        Ok(self.finish_report(&texts.join("\n\n")))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn require(what: &str, value: &str) -> Result<(), DocGenError> {
    if value.trim().is_empty() {
        return Err(DocGenError::InvalidInput {
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(())
}

/// The first `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn clamp_report_words(words: usize) -> usize {
    words.clamp(MIN_REPORT_WORDS, MAX_REPORT_WORDS)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

static RE_NUMBERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:\*\*)?\d+\.\s").unwrap());

/// Lines that open with an `N.` marker.
pub fn count_numbered_items(text: &str) -> usize {
    RE_NUMBERED_ITEM.find_iter(text).count()
}

static RE_DOTTED_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(\d+(?:\.\d+)*)\.?[ \t]+(\S.*?)[ \t]*$").unwrap());
static RE_HASH_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,3})[ \t]+(\S.*?)[ \t]*$").unwrap());

/// Section outline of generated text.
///
/// Dotted numbered lines come first (level = component count). Lines that
/// end in a full stop or run past 150 characters are list items or
/// references, not headings. `#` to `###` headings are added afterwards
/// when their title is not already listed.
pub fn extract_sections(text: &str) -> Vec<SectionEntry> {
    let mut sections: Vec<SectionEntry> = RE_DOTTED_SECTION
        .captures_iter(text)
        .filter_map(|c| {
            let number = c.get(1)?.as_str();
            let title = c.get(2)?.as_str().trim();
            if title.ends_with('.') || title.chars().count() > 150 {
                return None;
            }
            Some(SectionEntry {
                level: number.split('.').count().min(u8::MAX as usize) as u8,
                number: Some(number.to_string()),
                title: title.to_string(),
            })
        })
        .collect();

    for c in RE_HASH_SECTION.captures_iter(text) {
        let (Some(hashes), Some(title)) = (c.get(1), c.get(2)) else {
            continue;
        };
        let title = title.as_str().trim();
        if sections.iter().any(|s| s.title == title) {
            continue;
        }
        sections.push(SectionEntry {
            level: hashes.as_str().len() as u8,
            number: None,
            title: title.to_string(),
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleFailure;
    use crate::oracle::scripted::ScriptedOracle;
    use crate::progress::GenerationProgressCallback;
    use std::sync::Mutex;

    fn assistant(oracle: Arc<ScriptedOracle>) -> ResearchAssistant {
        ResearchAssistant::new(oracle, DocGenConfig::default())
    }

    #[tokio::test]
    async fn summary_uses_low_temperature_and_truncates() {
        let oracle = Arc::new(ScriptedOracle::new(["A concise overview."]));
        let a = assistant(oracle.clone());
        let paper = "word ".repeat(5000);
        let out = a.summarize_paper(&paper).await.unwrap();

        assert_eq!(out.summary, "A concise overview.\n");
        assert_eq!(out.word_count, 5000);
        assert_eq!(out.model, "scripted");

        let req = &oracle.requests()[0];
        assert_eq!(req.temperature, 0.3);
        assert_eq!(req.max_tokens, 1000);
        assert!(req.user.contains(&"word ".repeat(2400)));
        assert!(!req.user.contains(&"word ".repeat(2401)));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_calling_the_oracle() {
        let oracle = Arc::new(ScriptedOracle::new(["unused"]));
        let a = assistant(oracle.clone());
        assert!(matches!(
            a.summarize_paper("   ").await,
            Err(DocGenError::InvalidInput { .. })
        ));
        assert!(a.research_questions(None, Some("")).await.is_err());
        assert!(a.dissertation_outline("", None).await.is_err());
        assert!(a.citation(serde_json::json!({}), CitationStyle::Apa).await.is_err());
        assert!(oracle.requests().is_empty());
    }

    #[tokio::test]
    async fn questions_are_counted() {
        let oracle = Arc::new(ScriptedOracle::new([
            "1. How does X affect Y?\nContext.\n2. Why Z?\n3. When W?",
        ]));
        let out = assistant(oracle.clone())
            .research_questions(None, Some("Soil"))
            .await
            .unwrap();
        assert_eq!(out.count, 3);
        assert_eq!(oracle.requests()[0].temperature, 0.7);
    }

    #[tokio::test]
    async fn configured_temperature_overrides() {
        let oracle = Arc::new(ScriptedOracle::new(["x"]));
        let config = DocGenConfig::builder().temperature(0.1).build().unwrap();
        let a = ResearchAssistant::new(oracle.clone(), config);
        a.critique_arguments("paper").await.unwrap();
        assert_eq!(oracle.requests()[0].temperature, 0.1);
        assert_eq!(oracle.requests()[0].max_tokens, 2000);
    }

    #[tokio::test]
    async fn citation_carries_style_and_info() {
        let oracle = Arc::new(ScriptedOracle::new(["Smith, J. (2020)."]));
        let info = serde_json::json!({"title": "Climate Effects", "year": 2020});
        let out = assistant(oracle.clone())
            .citation(info.clone(), CitationStyle::Harvard)
            .await
            .unwrap();
        assert_eq!(out.style, CitationStyle::Harvard);
        assert_eq!(out.paper_info, info);
        assert!(oracle.requests()[0].user.contains("Climate Effects"));
        assert_eq!(oracle.requests()[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn outline_defaults_field() {
        let oracle = Arc::new(ScriptedOracle::new(["Chapter 1: Introduction"]));
        let out = assistant(oracle).dissertation_outline("Graph learning", None).await.unwrap();
        assert_eq!(out.field, DEFAULT_FIELD);
        assert_eq!(out.topic, "Graph learning");
    }

    #[tokio::test]
    async fn report_is_cleaned_and_sectioned() {
        let oracle = Arc::new(ScriptedOracle::new([
            "Quantum Sensing\n\n1. **Introduction**\nText.\n\n1.1 Background\nMore.\n\n2. Conclusion\nDone.",
        ]));
        let out = assistant(oracle.clone())
            .research_report("quantum sensing", Some(50))
            .await
            .unwrap();
        assert!(out.response.contains("1. Introduction\n"));
        assert!(!out.response.contains("**"));
        let numbers: Vec<_> = out.sections.iter().filter_map(|s| s.number.clone()).collect();
        assert_eq!(numbers, vec!["1", "1.1", "2"]);
        assert!(oracle.requests()[0].user.contains("about 500 words"));
        assert_eq!(oracle.requests()[0].max_tokens, 4096);
    }

    #[derive(Default)]
    struct Parts(Mutex<Vec<(usize, usize)>>);

    impl GenerationProgressCallback for Parts {
        fn on_part_start(&self, part: usize, total: usize) {
            self.0.lock().unwrap().push((part, total));
        }
    }

    #[tokio::test]
    async fn assignment_runs_three_parts_in_order() {
        let oracle = Arc::new(ScriptedOracle::new([
            "Title\n\nAbstract\nSummary.\n\n1. Introduction\nIntro.",
            "4. System Architecture\n[A]\n↓\n[B]",
            "9. Conclusion\nEnd.\n\n10. References\n1. Smith, J., 2020. *T*. J, 1(2), pp.3-4.",
        ]));
        let parts = Arc::new(Parts::default());
        let config = DocGenConfig::builder().progress_callback(parts.clone()).build().unwrap();
        let a = ResearchAssistant::new(oracle.clone(), config);

        let out = a.assignment_response("Build a chatbot.").await.unwrap();
        let temps: Vec<f32> = oracle.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.8, 0.8, 0.7]);
        assert!(oracle.requests().iter().all(|r| r.max_tokens == 4000));
        assert_eq!(*parts.0.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);

        let intro = out.response.find("1. Introduction").unwrap();
        let arch = out.response.find("4. System Architecture").unwrap();
        let refs = out.response.find("10. References").unwrap();
        assert!(intro < arch && arch < refs);
        assert!(out.response.contains("Intro.\n\n4. System Architecture"));
    }

    #[tokio::test]
    async fn oracle_failure_surfaces_verbatim() {
        let oracle = Arc::new(ScriptedOracle::failing(OracleFailure::RateLimited {
            provider: "openai".into(),
            retry_after_secs: Some(20),
        }));
        let err = assistant(oracle.clone()).summarize_paper("paper").await.unwrap_err();
        assert!(matches!(err, DocGenError::Oracle(OracleFailure::RateLimited { .. })));
        assert_eq!(oracle.requests().len(), 1);
    }

    #[test]
    fn sections_skip_references_and_merge_hash_headings() {
        let text = "1. Introduction\n1.1 Scope\n## Related Work\n## Introduction\n1. Smith, J., 2020. Title.\n";
        let s = extract_sections(text);
        assert_eq!(s.len(), 3);
        assert_eq!(s[1].level, 2);
        assert_eq!(s[2].title, "Related Work");
        assert_eq!(s[2].number, None);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn citation_style_parsing() {
        assert_eq!("mla".parse::<CitationStyle>().unwrap(), CitationStyle::Mla);
        assert_eq!(CitationStyle::Chicago.to_string(), "Chicago");
        assert!("ieee".parse::<CitationStyle>().is_err());
    }

    #[test]
    fn report_word_target_is_clamped() {
        assert_eq!(clamp_report_words(10), 500);
        assert_eq!(clamp_report_words(1200), 1200);
        assert_eq!(clamp_report_words(90_000), 5000);
    }
}
