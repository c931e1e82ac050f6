//! HTML renderer.
//!
//! A mechanical mapping from [`Block`] to markup: every inline style is
//! derived from the block's [`BlockStyle`], so this module makes no layout
//! decisions of its own. Output is a complete document suitable for a
//! headless browser's print-to-PDF.

use crate::config::DocGenConfig;
use crate::model::{heading_text, Alignment, Block, BlockStyle, StructuredBlock};
use crate::pipeline::style::{style_table, LINE_HEIGHT};
use std::fmt::Write;

/// Placeholder shown when a document has no blocks.
pub const EMPTY_PLACEHOLDER: &str = "No content to display";

/// Render with default page geometry (A4, 25 mm margins).
pub fn to_html(blocks: &[Block]) -> String {
    to_html_with_config(blocks, &DocGenConfig::default())
}

/// Render a complete HTML document using the config's page geometry.
pub fn to_html_with_config(blocks: &[Block], config: &DocGenConfig) -> String {
    let title = blocks
        .iter()
        .find_map(|b| match &b.content {
            StructuredBlock::Title { text } => Some(text.as_str()),
            _ => None,
        })
        .unwrap_or("Document");

    let mut out = String::with_capacity(4096 + blocks.len() * 256);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape_html(title));
    out.push_str("<style>\n");
    let _ = writeln!(
        out,
        "@page {{ size: {}; margin: {}mm; }}",
        config.page_size.css_name(),
        config.margin_mm
    );
    let _ = writeln!(
        out,
        "body {{ font-family: 'Times New Roman', Times, serif; font-size: 12pt; line-height: {LINE_HEIGHT}; color: #000; margin: 0; }}"
    );
    out.push_str("h1, h2, h3, h4, p, pre { margin-left: 0; margin-right: 0; }\n");
    out.push_str("</style>\n</head>\n<body>\n");

    if blocks.is_empty() {
        let style = css(&style_table().paragraph);
        let _ = writeln!(out, "<p style=\"{style}\">{EMPTY_PLACEHOLDER}</p>");
    }
    for block in blocks {
        render_block(&mut out, block);
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_block(out: &mut String, block: &Block) {
    let style = css(&block.style);
    match &block.content {
        StructuredBlock::Title { text } => {
            let _ = writeln!(out, "<h1 class=\"title\" style=\"{style}\">{}</h1>", escape_html(text));
        }
        StructuredBlock::Abstract { text } => {
            let label_size = block.style.label_size_pt.unwrap_or(block.style.size_pt);
            let _ = writeln!(
                out,
                "<section class=\"abstract\">\n<h2 style=\"font-size: {label_size}pt; font-weight: bold; text-align: center; margin: 0 0 6pt 0;\">Abstract</h2>\n<p style=\"{style}\">{}</p>\n</section>",
                escape_html(text)
            );
        }
        StructuredBlock::Heading {
            number,
            level,
            text,
        } => {
            let tag = (*level).clamp(1, 6);
            let _ = writeln!(
                out,
                "<h{tag} style=\"{style}\">{}</h{tag}>",
                escape_html(&heading_text(number.as_ref(), text))
            );
        }
        StructuredBlock::Paragraph { text } => {
            let _ = writeln!(out, "<p style=\"{style}\">{}</p>", escape_html(text));
        }
        StructuredBlock::ListItem {
            ordered,
            number,
            label,
            text,
        } => {
            let marker = match (ordered, number) {
                (true, Some(n)) => format!("<strong>{n}.</strong> "),
                (false, _) => "<strong>•</strong> ".to_string(),
                _ => String::new(),
            };
            let label = label
                .as_deref()
                .map(|l| format!("<strong>{}:</strong> ", escape_html(l)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "<p class=\"list-item\" style=\"{style}\">{marker}{label}{}</p>",
                escape_html(text)
            );
        }
        StructuredBlock::Reference { raw, title, url } => {
            let data_url = url
                .as_deref()
                .map(|u| format!(" data-url=\"{}\"", escape_html(u)))
                .unwrap_or_default();
            let body = match title.and_then(|s| {
                Some((raw.get(..s.start)?, raw.get(s.range())?, raw.get(s.end..)?))
            }) {
                Some((before, t, after)) => format!(
                    "{}<em>{}</em>{}",
                    escape_html(before),
                    escape_html(t),
                    escape_html(after)
                ),
                None => escape_html(raw),
            };
            let _ = writeln!(
                out,
                "<p class=\"reference\" style=\"{style}\"{data_url}>{body}</p>"
            );
        }
        StructuredBlock::Flowchart { nodes } => {
            let _ = writeln!(out, "<div class=\"flowchart\" style=\"{style}\">");
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    out.push_str("<div class=\"arrow\">↓</div>\n");
                }
                let _ = writeln!(
                    out,
                    "<div class=\"node\" style=\"display: inline-block; border: 1px solid #{}; padding: 4pt 10pt;\">[{}]</div>",
                    block.style.border.as_deref().unwrap_or("000000"),
                    escape_html(node)
                );
            }
            out.push_str("</div>\n");
        }
        StructuredBlock::Code { text } => {
            let _ = writeln!(out, "<pre style=\"{style}\"><code>{}</code></pre>", escape_html(text));
        }
    }
}

/// Inline CSS for a style, in points.
fn css(style: &BlockStyle) -> String {
    let mut s = format!(
        "font-family: '{}'; font-size: {}pt; font-weight: {}; text-align: {}; margin: {}pt 0 {}pt {}pt;",
        style.font.face(),
        style.size_pt,
        if style.bold { "bold" } else { "normal" },
        match style.align {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Justify => "justify",
        },
        style.space_before_pt,
        style.space_after_pt,
        style.indent_pt,
    );
    if style.hanging_pt > 0 {
        let _ = write!(
            s,
            " padding-left: {}pt; text-indent: -{}pt;",
            style.hanging_pt, style.hanging_pt
        );
    }
    if let Some(bg) = &style.background {
        let _ = write!(s, " background: #{bg}; padding: 8pt;");
    }
    if let Some(border) = &style.border {
        let _ = write!(s, " border-left: 4px solid #{border};");
    }
    s
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Visible text of an HTML document: tags dropped, entities decoded, block
/// boundaries kept as line breaks.
pub fn html_to_text(html: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static RE_HEAD: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<(?:head|style|script)\b.*?</(?:head|style|script)>").unwrap());
    static RE_BLOCK_END: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)</(?:p|h[1-6]|div|li|pre|section|tr)>|<br\s*/?>").unwrap());
    static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

    let s = RE_HEAD.replace_all(html, "");
    let s = RE_BLOCK_END.replace_all(&s, "\n\n");
    let s = RE_TAG.replace_all(&s, "");
    let s = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    let mut text = String::with_capacity(s.len());
    let mut blank = false;
    for line in s.lines().map(str::trim) {
        if line.is_empty() {
            blank = true;
            continue;
        }
        if blank && !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line);
        text.push('\n');
        blank = false;
    }
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentKind;
    use crate::pipeline::build::classify_and_build;

    fn render(raw: &str) -> String {
        to_html(&classify_and_build(raw, DocumentKind::GenericReport))
    }

    #[test]
    fn empty_document_has_placeholder() {
        let html = to_html(&[]);
        assert!(html.contains(EMPTY_PLACEHOLDER));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn heading_tag_follows_level() {
        let html = render("2.1 Background\nText.");
        assert!(html.contains("<h2 "), "{}", html);
        assert!(html.contains("2.1 Background</h2>"));
        assert!(html.contains("font-size: 18pt"));
    }

    #[test]
    fn paragraphs_are_justified_and_normal_weight() {
        let html = render("Plain prose here.");
        assert!(html.contains("text-align: justify"));
        assert!(html.contains("font-weight: normal"));
    }

    #[test]
    fn reference_url_is_data_attribute_only() {
        let html = render(
            "1. Smith, J., 2020. *Climate Effects*. Journal X, 1(2), pp.1-9. URL: https://doi.org/10.1/x",
        );
        let body = &html[html.find("<body>").unwrap()..];
        assert!(body.contains("data-url=\"https://doi.org/10.1/x\""));
        assert!(body.contains("<em>Climate Effects</em>"));
        assert!(!body.contains("<strong>"));
        let visible = html_to_text(body);
        assert!(!visible.contains("https://"), "{}", visible);
    }

    #[test]
    fn list_label_is_bold_body_plain() {
        let html = render("- **Scalability:** grows with load");
        assert!(html.contains("<strong>Scalability:</strong> grows with load"));
    }

    #[test]
    fn labelled_bullet_keeps_its_marker() {
        let html = render("- **Scalability:** grows with load");
        assert!(html.contains("<strong>•</strong> <strong>Scalability:</strong> grows with load"));
        let html = render("1. Scope: Narrow.");
        assert!(!html.contains('•'));
    }

    #[test]
    fn flowchart_shows_boxes_and_arrows() {
        let html = render("[User Interface]\n↓\n[Database]");
        assert!(html.contains("[User Interface]"));
        assert!(html.contains("↓"));
        assert!(html.contains("[Database]"));
        assert!(html.contains("Courier New"));
    }

    #[test]
    fn text_is_escaped() {
        let html = render("Use <b> & \"quotes\" 'here'.");
        assert!(html.contains("Use &lt;b&gt; &amp; &quot;quotes&quot; &#x27;here&#x27;."));
    }

    #[test]
    fn page_geometry_comes_from_config() {
        let config = DocGenConfig::builder()
            .page_size(crate::config::PageSize::Letter)
            .margin_mm(20)
            .build()
            .unwrap();
        let html = to_html_with_config(&[], &config);
        assert!(html.contains("@page { size: Letter; margin: 20mm; }"));
    }

    #[test]
    fn html_to_text_keeps_block_breaks() {
        let text = html_to_text(
            "<html><head><style>p{}</style></head><body><h1>T</h1><p>A &amp; B</p><p>C</p></body></html>",
        );
        assert_eq!(text, "T\n\nA & B\n\nC");
    }
}
