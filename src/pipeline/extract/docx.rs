//! DOCX text extraction: body paragraphs of `word/document.xml`.
//!
//! Only paragraphs that are direct children of `w:body` count, matching the
//! usual "document paragraphs" view; table cells, headers and text boxes are
//! not part of it. A paragraph's text is the concatenation of its runs
//! (including runs wrapped in `w:hyperlink`), with `w:tab` as `\t` and
//! `w:br`/`w:cr` as `\n`.

use super::{join_segments, local_name, Extractor, NativeJoin};
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Docx
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let xml = read_entry(&document.bytes, "word/document.xml", FormatTag::Docx)?;
        let paragraphs = body_paragraphs(&xml)?;
        debug!("DOCX: {} body paragraphs", paragraphs.len());
        Ok(join_segments(
            &paragraphs,
            NativeJoin::Separator(" "),
            config.paragraph_separator,
        ))
    }
}

/// Read one entry of an OOXML package held in memory.
pub(crate) fn read_entry(
    bytes: &[u8],
    name: &str,
    format: FormatTag,
) -> Result<Vec<u8>, DocpipeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DocpipeError::parse(format, format!("not a valid archive: {e}")))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|_| DocpipeError::parse(format, format!("missing {name}")))?;
    let mut buf = Vec::new();
    entry
        .read_to_end(&mut buf)
        .map_err(|e| DocpipeError::parse(format, format!("reading {name}: {e}")))?;
    Ok(buf)
}

/// Text of every body-level paragraph, in document order.
fn body_paragraphs(xml: &[u8]) -> Result<Vec<String>, DocpipeError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    // Local names of the open elements, outermost first.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    // Stack depth of the open body paragraph, if any.
    let mut paragraph_at: Option<usize> = None;
    let mut current = String::new();
    let mut paragraphs = Vec::new();
    let mut saw_body = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e.name().as_ref()).to_vec();
                saw_body |= name == b"body";
                if name == b"p" && paragraph_at.is_none() && top_is(&stack, b"body") {
                    paragraph_at = Some(stack.len());
                    current.clear();
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                saw_body |= name == b"body";
                if name == b"p" && paragraph_at.is_none() && top_is(&stack, b"body") {
                    paragraphs.push(String::new());
                } else if let Some(at) = paragraph_at {
                    if in_run(&stack, at) {
                        match name {
                            b"tab" => current.push('\t'),
                            b"br" | b"cr" => current.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(at) = paragraph_at {
                    if top_is(&stack, b"t") && in_run(&stack[..stack.len() - 1], at) {
                        let text = e
                            .unescape()
                            .map_err(|err| DocpipeError::parse(FormatTag::Docx, err))?;
                        current.push_str(&text);
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if paragraph_at == Some(stack.len()) {
                    paragraph_at = None;
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocpipeError::parse(FormatTag::Docx, e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_body {
        return Err(DocpipeError::parse(
            FormatTag::Docx,
            "word/document.xml has no w:body",
        ));
    }
    Ok(paragraphs)
}

/// Whether `stack` ends inside a run that belongs to the paragraph at depth `at`:
/// `p/r` or `p/hyperlink/r`.
fn in_run(stack: &[Vec<u8>], at: usize) -> bool {
    let tail: Vec<&[u8]> = stack[at + 1..].iter().map(Vec::as_slice).collect();
    matches!(tail.as_slice(), [b"r"] | [b"hyperlink", b"r"])
}

fn top_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|n| n.as_slice() == name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Build a minimal DOCX package around a `w:body` fragment.
    pub(crate) fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn extract(body: &str) -> String {
        let doc = FetchedDocument::new("https://example.com/a.docx", docx_with_body(body), None);
        DocxExtractor
            .extract(&doc, &ConversionConfig::default())
            .unwrap()
    }

    #[test]
    fn paragraphs_join_with_space() {
        let text = extract(
            "<w:p><w:r><w:t>First</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Sec</w:t></w:r><w:r><w:t>ond</w:t></w:r></w:p>",
        );
        assert_eq!(text, "First Second");
    }

    #[test]
    fn empty_paragraph_is_an_empty_segment() {
        let text = extract(
            "<w:p><w:r><w:t>A</w:t></w:r></w:p><w:p/><w:p></w:p><w:p><w:r><w:t>B</w:t></w:r></w:p>",
        );
        assert_eq!(text, "A   B");
    }

    #[test]
    fn tabs_breaks_and_hyperlinks() {
        let text = extract(
            "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r>\
             <w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink></w:p>",
        );
        assert_eq!(text, "a\tb\nclink");
    }

    #[test]
    fn table_cells_are_not_body_paragraphs() {
        let text = extract(
            "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>\
             <w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>\
             <w:p><w:r><w:t>Outro</w:t></w:r></w:p><w:sectPr/>",
        );
        assert_eq!(text, "Intro Outro");
    }

    #[test]
    fn entities_are_unescaped() {
        assert_eq!(extract("<w:p><w:r><w:t>R&amp;D &lt;3</w:t></w:r></w:p>"), "R&D <3");
    }

    #[test]
    fn not_a_zip_is_parse_error() {
        let doc = FetchedDocument::new("https://example.com/a.docx", b"PK?nope".to_vec(), None);
        let err = DocxExtractor
            .extract(&doc, &ConversionConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn missing_document_xml_is_parse_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/other.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let doc = FetchedDocument::new("https://example.com/a.docx", bytes, None);
        let err = DocxExtractor
            .extract(&doc, &ConversionConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
