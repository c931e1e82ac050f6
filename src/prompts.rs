//! Prompts for the research-assistant operations.
//!
//! Every prompt lives here so tests can inspect them without an oracle.
//! System prompts are constants; user prompts are built by small functions
//! that splice in (already truncated) input text.

/// Summary: prose paragraphs only.
pub const SUMMARY_SYSTEM: &str = "You are an expert academic research assistant. Write concise overview summaries as flowing paragraphs. Never use headings, bullets or labelled sections.";

pub fn summary_user(paper: &str) -> String {
    format!(
        r#"Provide a concise overview summary of the following academic paper.

Rules:
1. Write ONLY complete paragraphs: no headings, no bullets, no numbered lists.
2. 300-500 words in 3-5 paragraphs.
3. Cover the main topic, key findings, methodology (briefly) and conclusions.
4. Keep an objective academic register.
5. No markdown and no labels such as "Title:", "Key Findings:" or "Conclusions:".

Paper content:
{paper}

Write the overview now, in paragraph form only."#
    )
}

/// Research questions, from a paper or a bare topic.
pub const QUESTIONS_SYSTEM: &str = "You are an expert academic researcher who formulates high-quality research questions for scholarly work.";

pub fn questions_user(paper: Option<&str>, topic: Option<&str>) -> String {
    let context = match (topic, paper) {
        (Some(topic), _) => format!("Topic: {topic}\n\nBase the questions on this topic."),
        (None, Some(paper)) => format!(
            "Base the questions on the following paper, extending or exploring related areas.\n\nPaper content:\n{paper}"
        ),
        (None, None) => String::new(),
    };
    format!(
        r#"Generate 5-8 research questions.

Requirements:
1. Specific, answerable and researchable.
2. Cover theoretical, methodological and practical angles.
3. Format as a numbered list, one question per item.
4. Follow each question with 1-2 sentences of context.

{context}"#
    )
}

/// Critique with the five fixed sections the critique renderer recognises.
pub const CRITIQUE_SYSTEM: &str = "You are an expert academic critic who gives thorough, constructive and objective analysis of scholarly arguments.";

pub fn critique_user(paper: &str) -> String {
    format!(
        r#"Analyse and critique the arguments of the following academic paper.

Identify the main claims, weigh the evidence and reasoning, point out gaps and limitations, and suggest improvements.

Paper content:
{paper}

Use exactly these bold section labels, each on its own line:
**Summary of Main Arguments:**
**Strengths:**
**Weaknesses and Limitations:**
**Critical Analysis:**
**Suggestions for Improvement:**"#
    )
}

/// Long name of a citation style, used inside the prompt.
pub fn citation_style_description(style: &str) -> &'static str {
    match style {
        "MLA" => "Modern Language Association (MLA) 9th edition",
        "Harvard" => "Harvard referencing style",
        "Chicago" => "Chicago Manual of Style",
        _ => "American Psychological Association (APA) 7th edition",
    }
}

pub fn citation_system(style: &str) -> String {
    format!("You are an expert in academic citation formats. You produce accurate citations in {style} style.")
}

pub fn citation_user(style: &str, paper_info: &str) -> String {
    format!(
        r#"Generate a citation in {style} style ({description}).

Paper information:
{paper_info}

Requirements:
1. Follow {style} rules exactly, including punctuation and capitalisation.
2. Include author, title, year, venue and any identifiers given.
3. Mark missing information with [n.d.] or a suitable placeholder.
4. Give both the in-text citation and the full reference."#,
        description = citation_style_description(style)
    )
}

/// Dissertation outline with chapters and numbered subsections.
pub const OUTLINE_SYSTEM: &str = "You are an experienced academic advisor who writes well-structured dissertation outlines.";

pub fn outline_user(topic: &str, field: &str) -> String {
    format!(
        r#"Create a comprehensive dissertation outline for a student in {field}.

Dissertation Topic: {topic}

Requirements:
1. Chapters written as "Chapter N: Title" with numbered sections (1.1, 1.2, ...).
2. Standard structure: Abstract, Introduction, Literature Review, Methodology, Results, Discussion, Conclusion, References.
3. One or two sentences per section describing what it should cover.
4. Clear hierarchy and logical flow."#
    )
}

/// Research report: a titled, numbered, referenced literature review.
pub const REPORT_SYSTEM: &str = r#"You are an expert academic research assistant who automates literature reviews.

Guidelines:
- Formal academic style with clear numbered sections (1., 1.1, 2., ...).
- Support major claims with in-text citations (Author, Year).
- End with 10-15 references, one per line: Author, Year. Title. Journal/Publisher, Volume(Issue), pp.pages. URL: https://...
- Only use URLs you know to be real: https://doi.org/..., a Google Scholar search link, or an official publisher page.
- Structure: Title, Introduction, topical sections, Conclusion, References.
- Text only. No code, no figures, no bold in headings."#;

pub fn report_user(request: &str, word_count: usize) -> String {
    format!(
        r#"Produce a comprehensive academic report for the request below, grounded in peer-reviewed literature. Aim for about {word_count} words.

Request:
{request}

Requirements:
1. A clear title followed by numbered sections.
2. Introduction, topic-specific body sections, Conclusion and References.
3. In-text citations (Author, Year) for every major point.
4. A final "References" section with 10-15 sources, each followed by " URL: " and a verifiable link.
5. Numbered headings only (1., 1.1, 2., ...). No bullets for section titles and no bold in headings."#
    )
}

// ── Assignment response, three parts ────────────────────────────────────

pub const ASSIGNMENT_PART1_SYSTEM: &str = "You are an experienced academic writer with a natural, varied voice. Never include code or figures. Headings always carry their number and are plain text, for example \"1. Introduction\" and never \"1. **Introduction**\". Do not bold list labels or body text.";

pub const ASSIGNMENT_PART2_SYSTEM: &str = "You are an experienced academic writer. Describe architecture as a vertical flowchart of bracketed component names joined by arrows. Never include code or figures. Under subheadings, list labels carry no section number and no bold.";

pub const ASSIGNMENT_PART3_SYSTEM: &str = "You are an experienced academic writer who uses Harvard referencing. Never include code or figures. Headings always carry their number and are plain text. Major sections are numbered headings, never bullets. References follow: N. Author, Year. *Title*. Journal, Volume(Issue), pp.pages.";

pub fn assignment_part1_user(brief: &str) -> String {
    format!(
        r#"Write the FIRST PART of an academic assignment response (about 1400-1600 words).

Order:
- Title on the first line, on its own, unnumbered.
- Abstract (200-300 words), unnumbered.
- 1. Introduction (400-500 words).
- 2. Literature Review with 2.1 State-of-the-Art Research, 2.2 Gaps and Opportunities, 2.3 Critical Analysis.
- 3. Requirements Analysis with 3.1 Functional Requirements, 3.2 Non-Functional Requirements.

Assignment brief:
{brief}

Formatting: numbered headings (1., 1.1, 1.1.1) on their own lines, no markdown bold, no dash rules, no code, no figures."#
    )
}

pub fn assignment_part2_user(brief: &str) -> String {
    format!(
        r#"Write the SECOND PART of the same assignment response (about 1000-1200 words), continuing the numbering.

Include:
- 4. System Architecture/Design with 4.1 Architecture Overview and 4.2 System Flowchart. The flowchart shows only component names in brackets, one per line, joined by a line holding a single down arrow:
    [User Interface]
         ↓
    [Request Handler]
         ↓
    [Database]
  Add nothing after the flowchart.
- 5. Implementation with 5.1 Implementation Approach, 5.2 Technical Methodologies, 5.3 Algorithm Descriptions (conceptual, no code).
- 6. Testing with 6.1 Testing Strategies, 6.2 Testing Methodologies, 6.3 Validation. Items read "Unit Testing: description", without a "6." prefix and without bold.

Assignment brief, for reference:
{brief}"#
    )
}

pub fn assignment_part3_user(brief: &str) -> String {
    format!(
        r#"Write the FINAL PART of the same assignment response (about 1000-1200 words), continuing the numbering.

Include:
- 7. Deployment with 7.1 Deployment Process, 7.2 Configuration and Setup, 7.3 Environment Configuration.
- 8. Evaluation with 8.1 Performance Analysis, 8.2 Critical Assessment, 8.3 Limitations, 8.4 Future Improvements.
- 9. Conclusion (200-300 words).
- 10. References: at least 10 Harvard entries, one per line, numbered, for example:
  1. Smith, J., 2020. *Climate Effects on Agriculture*. Journal of Agriculture, 12(3), pp.45-59.
  No bold and no URLs.

Assignment brief, for reference:
{brief}"#
    )
}
