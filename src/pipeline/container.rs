//! Office Open XML package writer for [`DocumentTree`].
//!
//! A `.docx` is a ZIP of XML parts. Only the parts Word and LibreOffice
//! require are written: content types, package relationships, the body,
//! styles, bullet numbering and core properties.

use crate::error::DocGenError;
use crate::model::Alignment;
use crate::pipeline::docx::{DocumentTree, Paragraph, Run};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the produced package.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
<Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>
</Relationships>"#;

const NUMBERING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0">
<w:multiLevelType w:val="singleLevel"/>
<w:lvl w:ilvl="0">
<w:start w:val="1"/>
<w:numFmt w:val="bullet"/>
<w:lvlText w:val="•"/>
<w:lvlJc w:val="left"/>
<w:pPr><w:ind w:left="680" w:hanging="280"/></w:pPr>
<w:rPr><w:b/></w:rPr>
</w:lvl>
</w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_err(e: quick_xml::Error) -> DocGenError {
    DocGenError::SerializationFailure(format!("XML write failed: {}", e))
}

fn zip_err(e: zip::result::ZipError) -> DocGenError {
    DocGenError::SerializationFailure(format!("ZIP write failed: {}", e))
}

/// Serialise a document tree into `.docx` bytes.
pub fn serialize_document_model(tree: &DocumentTree) -> Result<Vec<u8>, DocGenError> {
    let document = document_xml(tree)?;
    let styles = styles_xml(tree)?;
    let core = core_xml(tree)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let parts: [(&str, &[u8]); 7] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document.as_slice()),
        ("word/styles.xml", styles.as_slice()),
        ("word/numbering.xml", NUMBERING.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("docProps/core.xml", core.as_slice()),
    ];
    for (name, bytes) in parts {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(name, options).map_err(zip_err)?;
        zip.write_all(bytes).map_err(|e| {
            DocGenError::SerializationFailure(format!("Failed to write part '{}': {}", name, e))
        })?;
    }

    let bytes = zip.finish().map_err(zip_err)?.into_inner();
    debug!(
        "Serialised DOCX: {} paragraphs, {} bytes",
        tree.paragraphs.len(),
        bytes.len()
    );
    Ok(bytes)
}

// ── Parts ────────────────────────────────────────────────────────────────

fn new_writer() -> Result<XmlWriter, DocGenError> {
    let mut w = Writer::new(Cursor::new(Vec::new()));
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;
    Ok(w)
}

fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), DocGenError> {
    let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
    w.write_event(Event::Start(el)).map_err(xml_err)
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), DocGenError> {
    let el = BytesStart::new(name).with_attributes(attrs.iter().copied());
    w.write_event(Event::Empty(el)).map_err(xml_err)
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), DocGenError> {
    w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

fn text(w: &mut XmlWriter, s: &str) -> Result<(), DocGenError> {
    w.write_event(Event::Text(BytesText::new(s))).map_err(xml_err)
}

fn document_xml(tree: &DocumentTree) -> Result<Vec<u8>, DocGenError> {
    let mut w = new_writer()?;
    start(&mut w, "w:document", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
    start(&mut w, "w:body", &[])?;

    for p in &tree.paragraphs {
        write_paragraph(&mut w, p)?;
    }

    let width = tree.page.width.to_string();
    let height = tree.page.height.to_string();
    let margin = tree.page.margin.to_string();
    start(&mut w, "w:sectPr", &[])?;
    empty(&mut w, "w:pgSz", &[("w:w", width.as_str()), ("w:h", height.as_str())])?;
    empty(
        &mut w,
        "w:pgMar",
        &[
            ("w:top", margin.as_str()),
            ("w:right", margin.as_str()),
            ("w:bottom", margin.as_str()),
            ("w:left", margin.as_str()),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    end(&mut w, "w:sectPr")?;

    end(&mut w, "w:body")?;
    end(&mut w, "w:document")?;
    Ok(w.into_inner().into_inner())
}

fn jc(align: Alignment) -> &'static str {
    match align {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Justify => "both",
    }
}

fn write_paragraph(w: &mut XmlWriter, p: &Paragraph) -> Result<(), DocGenError> {
    start(w, "w:p", &[])?;
    start(w, "w:pPr", &[])?;
    if let Some(id) = &p.style_id {
        empty(w, "w:pStyle", &[("w:val", id.as_str())])?;
    }
    if p.heading_level.is_some() {
        empty(w, "w:keepNext", &[])?;
    }
    if p.bullet {
        start(w, "w:numPr", &[])?;
        empty(w, "w:ilvl", &[("w:val", "0")])?;
        empty(w, "w:numId", &[("w:val", "1")])?;
        end(w, "w:numPr")?;
    }
    if let Some(color) = &p.border_left {
        start(w, "w:pBdr", &[])?;
        empty(
            w,
            "w:left",
            &[("w:val", "single"), ("w:sz", "24"), ("w:space", "8"), ("w:color", color.as_str())],
        )?;
        end(w, "w:pBdr")?;
    }
    if let Some(fill) = &p.shading {
        empty(w, "w:shd", &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", fill.as_str())])?;
    }
    let before = p.spacing_before.to_string();
    let after = p.spacing_after.to_string();
    let line = p.line.to_string();
    empty(
        w,
        "w:spacing",
        &[
            ("w:before", before.as_str()),
            ("w:after", after.as_str()),
            ("w:line", line.as_str()),
            ("w:lineRule", "auto"),
        ],
    )?;
    if p.indent_left > 0 || p.hanging > 0 {
        let left = p.indent_left.to_string();
        let hanging = p.hanging.to_string();
        empty(w, "w:ind", &[("w:left", left.as_str()), ("w:hanging", hanging.as_str())])?;
    }
    empty(w, "w:jc", &[("w:val", jc(p.alignment))])?;
    if let Some(level) = p.heading_level {
        let lvl = (level.saturating_sub(1)).to_string();
        empty(w, "w:outlineLvl", &[("w:val", lvl.as_str())])?;
    }
    end(w, "w:pPr")?;

    for run in &p.runs {
        write_run(w, run)?;
    }
    end(w, "w:p")
}

fn write_run(w: &mut XmlWriter, run: &Run) -> Result<(), DocGenError> {
    start(w, "w:r", &[])?;
    start(w, "w:rPr", &[])?;
    empty(
        w,
        "w:rFonts",
        &[
            ("w:ascii", run.font.as_str()),
            ("w:hAnsi", run.font.as_str()),
            ("w:cs", run.font.as_str()),
        ],
    )?;
    if run.bold {
        empty(w, "w:b", &[])?;
        empty(w, "w:bCs", &[])?;
    }
    if run.italic {
        empty(w, "w:i", &[])?;
        empty(w, "w:iCs", &[])?;
    }
    let size = run.size_half_points.to_string();
    empty(w, "w:sz", &[("w:val", size.as_str())])?;
    empty(w, "w:szCs", &[("w:val", size.as_str())])?;
    end(w, "w:rPr")?;

    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            empty(w, "w:br", &[])?;
        }
        start(w, "w:t", &[("xml:space", "preserve")])?;
        text(w, line)?;
        end(w, "w:t")?;
    }
    end(w, "w:r")
}

/// Named paragraph styles so headings show in the navigation pane.
fn styles_xml(tree: &DocumentTree) -> Result<Vec<u8>, DocGenError> {
    let mut w = new_writer()?;
    start(&mut w, "w:styles", &[("xmlns:w", NS_W)])?;

    start(&mut w, "w:docDefaults", &[])?;
    start(&mut w, "w:rPrDefault", &[])?;
    start(&mut w, "w:rPr", &[])?;
    empty(
        &mut w,
        "w:rFonts",
        &[
            ("w:ascii", "Times New Roman"),
            ("w:hAnsi", "Times New Roman"),
            ("w:cs", "Times New Roman"),
        ],
    )?;
    empty(&mut w, "w:sz", &[("w:val", "24")])?;
    end(&mut w, "w:rPr")?;
    end(&mut w, "w:rPrDefault")?;
    end(&mut w, "w:docDefaults")?;

    start(&mut w, "w:style", &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")])?;
    empty(&mut w, "w:name", &[("w:val", "Normal")])?;
    end(&mut w, "w:style")?;

    let mut ids: Vec<&str> = tree
        .paragraphs
        .iter()
        .filter_map(|p| p.style_id.as_deref())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    for id in ids {
        let name = match id.strip_prefix("Heading") {
            Some(n) => format!("heading {n}"),
            None => id.to_lowercase(),
        };
        start(&mut w, "w:style", &[("w:type", "paragraph"), ("w:styleId", id)])?;
        empty(&mut w, "w:name", &[("w:val", name.as_str())])?;
        empty(&mut w, "w:basedOn", &[("w:val", "Normal")])?;
        empty(&mut w, "w:next", &[("w:val", "Normal")])?;
        empty(&mut w, "w:qFormat", &[])?;
        end(&mut w, "w:style")?;
    }

    end(&mut w, "w:styles")?;
    Ok(w.into_inner().into_inner())
}

fn core_xml(tree: &DocumentTree) -> Result<Vec<u8>, DocGenError> {
    let mut w = new_writer()?;
    start(
        &mut w,
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
        ],
    )?;
    start(&mut w, "dc:title", &[])?;
    text(&mut w, tree.title.as_deref().unwrap_or("Document"))?;
    end(&mut w, "dc:title")?;
    start(&mut w, "dc:creator", &[])?;
    text(&mut w, "ResearchAid AI")?;
    end(&mut w, "dc:creator")?;
    end(&mut w, "cp:coreProperties")?;
    Ok(w.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentKind;
    use crate::pipeline::build::classify_and_build;
    use crate::pipeline::docx::to_document_model;
    use std::io::Read;
    use zip::ZipArchive;

    fn package(raw: &str) -> Vec<u8> {
        let blocks = classify_and_build(raw, DocumentKind::GenericReport);
        serialize_document_model(&to_document_model(&blocks)).unwrap()
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn package_contains_required_parts() {
        let bytes = package("1. Introduction\nText.");
        assert_eq!(&bytes[..2], b"PK");
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for required in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/numbering.xml",
            "word/_rels/document.xml.rels",
            "docProps/core.xml",
        ] {
            assert!(names.contains(&required), "missing {}", required);
        }
    }

    #[test]
    fn body_carries_heading_style_and_escaped_text() {
        let bytes = package("1. Introduction\nA & B < C.");
        let doc = part(&bytes, "word/document.xml");
        assert!(doc.contains(r#"<w:pStyle w:val="Heading1"/>"#));
        assert!(doc.contains("1. Introduction"));
        assert!(doc.contains("A &amp; B &lt; C."));
        assert!(doc.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));
        let styles = part(&bytes, "word/styles.xml");
        assert!(styles.contains("heading 1"));
    }

    #[test]
    fn justified_paragraph_uses_both() {
        let doc = part(&package("Prose."), "word/document.xml");
        assert!(doc.contains(r#"<w:jc w:val="both"/>"#));
    }

    #[test]
    fn code_newlines_become_breaks() {
        let doc = part(&package("```\na\nb\n```"), "word/document.xml");
        assert!(doc.contains("<w:br/>"));
    }

    #[test]
    fn core_properties_hold_title() {
        let bytes = package("ResearchAid AI Report: Distributed Systems Design\nBody.");
        let core = part(&bytes, "docProps/core.xml");
        assert!(core.contains("<dc:title>ResearchAid AI Report: Distributed Systems Design</dc:title>"));
    }
}
