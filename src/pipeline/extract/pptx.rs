//! PPTX text extraction: shape text, slide by slide.
//!
//! Slides are visited in presentation order (`p:sldIdLst` resolved through
//! `ppt/_rels/presentation.xml.rels`), not archive order. Within a slide the
//! top-level shapes of `p:spTree` are visited in document order; every
//! `p:sp` with a `p:txBody` contributes its text followed by a newline.
//! Pictures, group shapes, graphic frames and connectors carry no text of
//! their own and are skipped.

use super::docx::read_entry;
use super::{join_segments, local_name, Extractor, NativeJoin};
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

pub struct PptxExtractor;

impl Extractor for PptxExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Pptx
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let bytes = &document.bytes;
        let presentation = read_entry(bytes, "ppt/presentation.xml", FormatTag::Pptx)?;
        let rels = read_entry(bytes, "ppt/_rels/presentation.xml.rels", FormatTag::Pptx)?;

        let targets = relationship_targets(&rels)?;
        let mut shapes = Vec::new();
        for rid in slide_rel_ids(&presentation)? {
            let target = targets.get(&rid).ok_or_else(|| {
                DocpipeError::parse(FormatTag::Pptx, format!("slide relationship {rid} not found"))
            })?;
            let slide = read_entry(bytes, &slide_part_name(target), FormatTag::Pptx)?;
            shapes.extend(slide_shape_texts(&slide)?);
        }
        debug!("PPTX: {} text shapes", shapes.len());

        Ok(join_segments(
            &shapes,
            NativeJoin::Terminator("\n"),
            config.paragraph_separator,
        ))
    }
}

fn xml_error(e: impl ToString) -> DocpipeError {
    DocpipeError::parse(FormatTag::Pptx, e)
}

/// Value of the attribute whose local name is `name` and whose key is
/// namespace-qualified (`r:id`, not the bare numeric `id`).
fn prefixed_attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, DocpipeError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = attr.key.as_ref();
        if key.contains(&b':') && local_name(key) == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn plain_attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, DocpipeError> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// Relationship ids of the slides, in presentation order.
fn slide_rel_ids(xml: &[u8]) -> Result<Vec<String>, DocpipeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if local_name(e.name().as_ref()) == b"sldId" {
                    if let Some(id) = prefixed_attr(e, b"id")? {
                        ids.push(id);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// `Id → Target` for every relationship in a `.rels` part.
fn relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>, DocpipeError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if local_name(e.name().as_ref()) == b"Relationship" {
                    if let (Some(id), Some(target)) =
                        (plain_attr(e, b"Id")?, plain_attr(e, b"Target")?)
                    {
                        targets.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Archive entry name for a relationship target of `ppt/presentation.xml`.
fn slide_part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

/// Text of every top-level text-bearing shape on one slide.
fn slide_shape_texts(xml: &[u8]) -> Result<Vec<String>, DocpipeError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    // Depth of the open top-level `p:sp`.
    let mut shape_at: Option<usize> = None;
    let mut has_body = false;
    let mut in_paragraph = false;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut shapes = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref()).to_vec();
                match shape_at {
                    None if name == b"sp" && top_is(&stack, b"spTree") => {
                        shape_at = Some(stack.len());
                        has_body = false;
                        paragraphs.clear();
                    }
                    Some(at) if name == b"txBody" && stack.len() == at + 1 => has_body = true,
                    Some(at)
                        if name == b"p"
                            && stack.len() == at + 2
                            && stack[at + 1] == b"txBody" =>
                    {
                        in_paragraph = true;
                        current.clear();
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if let Some(at) = shape_at {
                    if name == b"txBody" && stack.len() == at + 1 {
                        has_body = true;
                    } else if name == b"p" && stack.len() == at + 2 && stack[at + 1] == b"txBody" {
                        paragraphs.push(String::new());
                    } else if name == b"br" && in_paragraph {
                        // soft break inside a paragraph, kept distinct from the paragraph join
                        current.push('\u{0B}');
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_paragraph && top_is(&stack, b"t") {
                    current.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if let Some(at) = shape_at {
                    if in_paragraph && stack.len() == at + 2 {
                        in_paragraph = false;
                        paragraphs.push(std::mem::take(&mut current));
                    } else if stack.len() == at {
                        shape_at = None;
                        if has_body {
                            shapes.push(paragraphs.join("\n"));
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(shapes)
}

fn top_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|n| n.as_slice() == name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    /// A text shape whose body holds one `a:p` per entry.
    pub(crate) fn text_shape(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{p}</a:t></a:r></a:p>"))
            .collect();
        format!("<p:sp><p:nvSpPr/><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{body}</p:txBody></p:sp>")
    }

    /// Build a PPTX package. `slides[i]` is the inner XML of the i-th
    /// slide's `p:spTree`; slides are listed in `order` (indices into `slides`).
    pub(crate) fn pptx(slides: &[String], order: &[usize]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();

        let ids: String = order
            .iter()
            .enumerate()
            .map(|(n, i)| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + n, i + 10))
            .collect();
        zip.start_file("ppt/presentation.xml", opts).unwrap();
        zip.write_all(format!("<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst></p:presentation>").as_bytes())
            .unwrap();

        let rels: String = (0..slides.len())
            .map(|i| {
                format!(
                    "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
                    i + 10,
                    i + 1
                )
            })
            .collect();
        zip.start_file("ppt/_rels/presentation.xml.rels", opts).unwrap();
        zip.write_all(
            format!("<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{rels}</Relationships>")
                .as_bytes(),
        )
        .unwrap();

        for (i, tree) in slides.iter().enumerate() {
            zip.start_file(format!("ppt/slides/slide{}.xml", i + 1), opts)
                .unwrap();
            zip.write_all(
                format!("<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr/><p:grpSpPr/>{tree}</p:spTree></p:cSld></p:sld>")
                    .as_bytes(),
            )
            .unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn extract(bytes: Vec<u8>) -> Result<String, DocpipeError> {
        let doc = FetchedDocument::new("https://example.com/deck.pptx", bytes, None);
        PptxExtractor.extract(&doc, &ConversionConfig::default())
    }

    #[test]
    fn shapes_end_with_newline_in_slide_order() {
        let slides = vec![
            format!("{}{}", text_shape(&["Title"]), text_shape(&["Body line"])),
            text_shape(&["Second slide"]),
        ];
        let text = extract(pptx(&slides, &[0, 1])).unwrap();
        assert_eq!(text, "Title\nBody line\nSecond slide\n");
    }

    #[test]
    fn presentation_order_wins_over_file_names() {
        let slides = vec![text_shape(&["one"]), text_shape(&["two"])];
        let text = extract(pptx(&slides, &[1, 0])).unwrap();
        assert_eq!(text, "two\none\n");
    }

    #[test]
    fn shapes_without_text_are_skipped() {
        let slides = vec![format!(
            "<p:pic><p:nvPicPr/></p:pic><p:sp><p:nvSpPr/><p:spPr/></p:sp>{}<p:cxnSp/>",
            text_shape(&["kept"])
        )];
        assert_eq!(extract(pptx(&slides, &[0])).unwrap(), "kept\n");
    }

    #[test]
    fn multi_paragraph_shape_joins_with_newline() {
        let slides = vec![text_shape(&["line one", "line two"])];
        assert_eq!(extract(pptx(&slides, &[0])).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn soft_break_and_empty_paragraph() {
        let slides = vec![
            "<p:sp><p:nvSpPr/><p:spPr/><p:txBody><a:bodyPr/>\
             <a:p><a:r><a:t>first</a:t></a:r><a:br/><a:r><a:t>same paragraph</a:t></a:r></a:p>\
             <a:p/>\
             <a:p><a:r><a:t>last</a:t></a:r></a:p>\
             </p:txBody></p:sp>"
                .to_string(),
        ];
        assert_eq!(
            extract(pptx(&slides, &[0])).unwrap(),
            "first\u{0B}same paragraph\n\nlast\n"
        );
    }

    #[test]
    fn group_shapes_are_not_descended() {
        let slides = vec![format!(
            "<p:grpSp><p:nvGrpSpPr/><p:grpSpPr/>{}</p:grpSp>{}",
            text_shape(&["inside group"]),
            text_shape(&["top level"])
        )];
        assert_eq!(extract(pptx(&slides, &[0])).unwrap(), "top level\n");
    }

    #[test]
    fn slide_part_names() {
        assert_eq!(slide_part_name("slides/slide3.xml"), "ppt/slides/slide3.xml");
        assert_eq!(slide_part_name("/ppt/slides/slide3.xml"), "ppt/slides/slide3.xml");
    }

    #[test]
    fn missing_presentation_is_parse_error() {
        let err = extract(b"not an archive".to_vec()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }
}
