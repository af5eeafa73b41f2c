//! Markdown → DOCX: normalize, convert with pandoc, then restyle every run.
//!
//! ## Steps
//!
//! 1. [`normalize_markdown`] trims every source line, drops blank ones and
//!    rejoins with blank lines, so each non-empty line becomes a paragraph of
//!    its own instead of being merged with its neighbours.
//! 2. pandoc converts the result (`-o -` keeps the archive in memory).
//! 3. [`restyle_runs`] rewrites `word/document.xml`, forcing the configured
//!    font family and size onto every `w:r`. All other archive entries are
//!    copied through untouched.

use crate::config::{ConversionConfig, DocxStyle};
use crate::error::DocpipeError;
use crate::pipeline::tools::{self, PANDOC};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::io::{Cursor, Read, Write};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const PANDOC_ARGS: &[&str] = &["-f", "markdown+pipe_tables", "-t", "docx", "-o", "-"];
const DOCUMENT_XML: &str = "word/document.xml";

/// Every line boundary a Unicode-aware `splitlines` recognises.
static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\r\n|[\n\r\u{0B}\u{0C}\u{1C}\u{1D}\u{1E}\u{85}\u{2028}\u{2029}]").unwrap()
});

/// Render Markdown to DOCX bytes. Blocking.
pub fn render_docx_blocking(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<Vec<u8>, DocpipeError> {
    let normalized = normalize_markdown(markdown);
    let program = PANDOC.resolve(config.pandoc_path.as_deref())?;
    let output = PANDOC.run(&program, PANDOC_ARGS, normalized.as_bytes())?;

    if !output.status.success() {
        return Err(DocpipeError::render("pandoc", tools::diagnostic(&output)));
    }
    if output.stdout.is_empty() {
        return Err(DocpipeError::render("pandoc", "produced no output"));
    }
    debug!("pandoc produced {} bytes", output.stdout.len());

    let styled = restyle_runs(&output.stdout, &config.docx_style)?;
    info!("Rendered DOCX: {} bytes", styled.len());
    Ok(styled)
}

/// One paragraph per non-blank source line.
pub fn normalize_markdown(markdown: &str) -> String {
    RE_LINE_BREAK
        .split(markdown)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn invariant(detail: impl std::fmt::Display) -> DocpipeError {
    DocpipeError::render("docx restyle", format!("invariant violated: {detail}"))
}

/// Force `style` onto every run of a DOCX package.
pub fn restyle_runs(docx: &[u8], style: &DocxStyle) -> Result<Vec<u8>, DocpipeError> {
    let mut archive = ZipArchive::new(Cursor::new(docx))
        .map_err(|e| invariant(format!("converter output is not an archive: {e}")))?;

    let mut document = Vec::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|_| invariant(format!("{DOCUMENT_XML} missing")))?
        .read_to_end(&mut document)
        .map_err(|e| invariant(format!("reading {DOCUMENT_XML}: {e}")))?;

    let (rewritten, runs) = restyle_document_xml(&document, style)?;
    debug!("Restyled {} runs", runs);

    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for idx in 0..archive.len() {
        let entry = archive
            .by_index_raw(idx)
            .map_err(|e| invariant(format!("archive entry {idx}: {e}")))?;
        if entry.name() == DOCUMENT_XML {
            drop(entry);
            out.start_file(DOCUMENT_XML, options)
                .map_err(|e| DocpipeError::render("docx restyle", e))?;
            out.write_all(&rewritten)
                .map_err(|e| DocpipeError::render("docx restyle", e))?;
        } else {
            out.raw_copy_file(entry)
                .map_err(|e| DocpipeError::render("docx restyle", e))?;
        }
    }

    let cursor = out
        .finish()
        .map_err(|e| DocpipeError::render("docx restyle", e))?;
    Ok(cursor.into_inner())
}

// ── Run properties ───────────────────────────────────────────────────────

/// `CT_RPr` child order; anything unlisted sorts after these.
const RPR_ORDER: &[&[u8]] = &[
    b"rStyle", b"rFonts", b"b", b"bCs", b"i", b"iCs", b"caps", b"smallCaps", b"strike",
    b"dstrike", b"outline", b"shadow", b"emboss", b"imprint", b"noProof", b"snapToGrid",
    b"vanish", b"webHidden", b"color", b"spacing", b"w", b"kern", b"position", b"sz", b"szCs",
    b"highlight", b"u", b"effect", b"bdr", b"shd", b"fitText", b"vertAlign", b"rtl", b"cs",
    b"em", b"lang", b"eastAsianLayout", b"specVanish", b"oMath", b"rPrChange",
];

fn rpr_rank(local: &[u8]) -> usize {
    RPR_ORDER
        .iter()
        .position(|name| *name == local)
        .unwrap_or(RPR_ORDER.len())
}

/// One direct child of `w:rPr` with everything nested inside it.
struct RprChild {
    local: Vec<u8>,
    events: Vec<Event<'static>>,
}

fn forced_children(style: &DocxStyle) -> Vec<RprChild> {
    let family = style.font_family.as_str();
    let size = style.half_points().to_string();
    let fonts = BytesStart::new("w:rFonts").with_attributes([
        ("w:ascii", family),
        ("w:hAnsi", family),
        ("w:cs", family),
        ("w:eastAsia", family),
    ]);
    let sz = BytesStart::new("w:sz").with_attributes([("w:val", size.as_str())]);
    let sz_cs = BytesStart::new("w:szCs").with_attributes([("w:val", size.as_str())]);
    vec![
        RprChild {
            local: b"rFonts".to_vec(),
            events: vec![Event::Empty(fonts.into_owned())],
        },
        RprChild {
            local: b"sz".to_vec(),
            events: vec![Event::Empty(sz.into_owned())],
        },
        RprChild {
            local: b"szCs".to_vec(),
            events: vec![Event::Empty(sz_cs.into_owned())],
        },
    ]
}

/// Merge existing `w:rPr` children with the forced font and size.
fn merged_rpr(existing: Vec<RprChild>, style: &DocxStyle) -> Vec<RprChild> {
    let mut children: Vec<RprChild> = existing
        .into_iter()
        .filter(|c| !matches!(c.local.as_slice(), b"rFonts" | b"sz" | b"szCs"))
        .collect();
    children.extend(forced_children(style));
    children.sort_by_key(|c| rpr_rank(&c.local));
    children
}

fn local_of(name: &[u8]) -> &[u8] {
    crate::pipeline::extract::local_name(name)
}

/// Parser state for the run currently being rewritten.
enum RunState {
    /// Outside any run, or past a run's properties.
    Outside,
    /// Just after `<w:r>`; its `w:rPr`, if any, is next.
    AwaitingProps,
    /// Inside a run's `w:rPr`, collecting its children.
    InProps {
        children: Vec<RprChild>,
        depth: usize,
    },
}

/// Rewrite `word/document.xml`; returns the new XML and the number of runs seen.
fn restyle_document_xml(xml: &[u8], style: &DocxStyle) -> Result<(Vec<u8>, usize), DocpipeError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut state = RunState::Outside;
    let mut runs = 0usize;
    let mut saw_body = false;

    let xml_err = |e: quick_xml::Error| invariant(format!("{DOCUMENT_XML}: {e}"));

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?.into_owned();
        if matches!(event, Event::Eof) {
            break;
        }
        if let Event::Start(ref e) | Event::Empty(ref e) = event {
            saw_body |= local_of(e.name().as_ref()) == b"body";
        }

        state = match state {
            RunState::InProps {
                mut children,
                depth,
            } => match event {
                Event::End(ref e) if depth == 0 && is_w(e.name().as_ref(), b"rPr") => {
                    write_rpr(&mut writer, merged_rpr(children, style))?;
                    RunState::Outside
                }
                Event::Start(ref e) if depth == 0 => {
                    children.push(RprChild {
                        local: local_of(e.name().as_ref()).to_vec(),
                        events: vec![event.clone()],
                    });
                    RunState::InProps {
                        children,
                        depth: 1,
                    }
                }
                Event::Empty(ref e) if depth == 0 => {
                    children.push(RprChild {
                        local: local_of(e.name().as_ref()).to_vec(),
                        events: vec![event.clone()],
                    });
                    RunState::InProps { children, depth }
                }
                // Whitespace between children is dropped.
                _ if depth == 0 => RunState::InProps { children, depth },
                _ => {
                    let depth = match event {
                        Event::Start(_) => depth + 1,
                        Event::End(_) => depth - 1,
                        _ => depth,
                    };
                    if let Some(last) = children.last_mut() {
                        last.events.push(event);
                    }
                    RunState::InProps { children, depth }
                }
            },

            RunState::AwaitingProps => match event {
                Event::Start(ref e) if is_w(e.name().as_ref(), b"rPr") => RunState::InProps {
                    children: Vec::new(),
                    depth: 0,
                },
                Event::Empty(ref e) if is_w(e.name().as_ref(), b"rPr") => {
                    write_rpr(&mut writer, merged_rpr(Vec::new(), style))?;
                    RunState::Outside
                }
                Event::Text(ref t) if t.iter().all(u8::is_ascii_whitespace) => {
                    write(&mut writer, &event)?;
                    RunState::AwaitingProps
                }
                other => {
                    write_rpr(&mut writer, merged_rpr(Vec::new(), style))?;
                    handle_outside(&mut writer, other, &mut runs, style)?
                }
            },

            RunState::Outside => handle_outside(&mut writer, event, &mut runs, style)?,
        };
        buf.clear();
    }

    if !saw_body {
        return Err(invariant(format!("{DOCUMENT_XML} has no w:body")));
    }
    if !matches!(state, RunState::Outside) {
        return Err(invariant(format!("{DOCUMENT_XML} ends inside a run")));
    }
    Ok((writer.into_inner().into_inner(), runs))
}

fn handle_outside(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    event: Event<'static>,
    runs: &mut usize,
    style: &DocxStyle,
) -> Result<RunState, DocpipeError> {
    match event {
        Event::Start(ref e) if is_w(e.name().as_ref(), b"r") => {
            *runs += 1;
            write(writer, &event)?;
            Ok(RunState::AwaitingProps)
        }
        // `<w:r/>` carries no text but still gets the fixed style.
        Event::Empty(ref e) if is_w(e.name().as_ref(), b"r") => {
            *runs += 1;
            let start = e.clone();
            let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            write(writer, &Event::Start(start))?;
            write_rpr(writer, merged_rpr(Vec::new(), style))?;
            write(writer, &Event::End(end))?;
            Ok(RunState::Outside)
        }
        other => {
            write(writer, &other)?;
            Ok(RunState::Outside)
        }
    }
}

/// WordprocessingML element test; `m:r` (math runs) and friends do not match.
fn is_w(name: &[u8], local: &[u8]) -> bool {
    name.strip_prefix(b"w:") == Some(local)
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: &Event<'_>) -> Result<(), DocpipeError> {
    writer
        .write_event(event)
        .map_err(|e| DocpipeError::render("docx restyle", e))
}

fn write_rpr(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    children: Vec<RprChild>,
) -> Result<(), DocpipeError> {
    write(writer, &Event::Start(BytesStart::new("w:rPr")))?;
    for child in &children {
        for event in &child.events {
            write(writer, event)?;
        }
    }
    write(writer, &Event::End(BytesEnd::new("w:rPr")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::docx::tests::docx_with_body;

    fn document_xml(docx: &[u8]) -> String {
        let mut archive = ZipArchive::new(Cursor::new(docx)).unwrap();
        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_XML)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    fn restyle_body(body: &str) -> String {
        let styled = restyle_runs(&docx_with_body(body), &DocxStyle::default()).unwrap();
        document_xml(&styled)
    }

    const FORCED: &str = r#"<w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri" w:eastAsia="Calibri"/><w:sz w:val="22"/><w:szCs w:val="22"/>"#;

    #[test]
    fn normalize_splits_every_line_into_a_paragraph() {
        assert_eq!(
            normalize_markdown("# Title\nLine A\nLine B"),
            "# Title\n\nLine A\n\nLine B"
        );
    }

    #[test]
    fn normalize_trims_and_drops_blank_lines() {
        assert_eq!(
            normalize_markdown("  one  \r\n\r\n\n   \ntwo\u{2028}three\n"),
            "one\n\ntwo\n\nthree"
        );
        assert_eq!(normalize_markdown("\n \n"), "");
    }

    #[test]
    fn run_without_props_gains_them() {
        let xml = restyle_body("<w:p><w:r><w:t>Hello</w:t></w:r></w:p>");
        assert!(
            xml.contains(&format!("<w:r><w:rPr>{FORCED}</w:rPr><w:t>Hello</w:t></w:r>")),
            "{xml}"
        );
    }

    #[test]
    fn existing_font_and_size_are_replaced_in_schema_order() {
        let xml = restyle_body(
            r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="40"/><w:rFonts w:ascii="Cambria"/><w:i/></w:rPr><w:t>x</w:t></w:r></w:p>"#,
        );
        assert!(!xml.contains("Cambria"));
        assert!(!xml.contains(r#"w:val="40""#));
        let expected = r#"<w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri" w:eastAsia="Calibri"/><w:b/><w:i/><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr>"#;
        assert!(xml.contains(expected), "{xml}");
    }

    #[test]
    fn nested_property_children_are_kept() {
        let xml = restyle_body(
            r#"<w:p><w:r><w:rPr><w:rStyle w:val="Strong"/><w:rPrChange w:id="1"><w:rPr><w:b/></w:rPr></w:rPrChange></w:rPr><w:t>x</w:t></w:r></w:p>"#,
        );
        assert!(xml.contains(&format!(
            r#"<w:rPr><w:rStyle w:val="Strong"/>{FORCED}<w:rPrChange w:id="1"><w:rPr><w:b/></w:rPr></w:rPrChange></w:rPr>"#
        )), "{xml}");
    }

    #[test]
    fn paragraph_mark_props_are_untouched() {
        let xml = restyle_body(
            r#"<w:p><w:pPr><w:rPr><w:b/></w:rPr></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#,
        );
        assert!(xml.contains("<w:pPr><w:rPr><w:b/></w:rPr></w:pPr>"), "{xml}");
    }

    #[test]
    fn restyle_is_deterministic_and_idempotent() {
        let docx = docx_with_body(
            r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="40"/></w:rPr><w:t>Title</w:t></w:r></w:p><w:p><w:r><w:t>Body</w:t></w:r></w:p>"#,
        );
        let style = DocxStyle::default();
        let first = restyle_runs(&docx, &style).unwrap();
        let second = restyle_runs(&docx, &style).unwrap();
        assert_eq!(first, second);

        let again = restyle_runs(&first, &style).unwrap();
        assert_eq!(document_xml(&again), document_xml(&first));
    }

    #[test]
    fn every_run_is_styled() {
        let xml = restyle_body(
            "<w:p><w:r><w:t>a</w:t></w:r><w:hyperlink><w:r><w:t>b</w:t></w:r></w:hyperlink></w:p>\
             <w:p><w:r><w:rPr/><w:t>c</w:t></w:r><w:r/></w:p>",
        );
        assert_eq!(xml.matches("<w:r>").count(), 4);
        assert_eq!(xml.matches(FORCED).count(), 4);
    }

    #[test]
    fn text_is_preserved_verbatim() {
        let xml = restyle_body(r#"<w:p><w:r><w:t xml:space="preserve">R&amp;D  </w:t></w:r></w:p>"#);
        assert!(xml.contains(r#"<w:t xml:space="preserve">R&amp;D  </w:t>"#));
    }

    #[test]
    fn other_entries_are_copied() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", opts).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file(DOCUMENT_XML, opts).unwrap();
        zip.write_all(b"<w:document xmlns:w=\"x\"><w:body/></w:document>")
            .unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let styled = restyle_runs(&bytes, &DocxStyle::default()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(styled.as_slice())).unwrap();
        let mut types = String::new();
        archive
            .by_name("[Content_Types].xml")
            .unwrap()
            .read_to_string(&mut types)
            .unwrap();
        assert_eq!(types, "<Types/>");
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn missing_body_is_invariant_violation() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_XML, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<w:document xmlns:w=\"x\"/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = restyle_runs(&bytes, &DocxStyle::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RenderError);
        assert!(err.to_string().contains("invariant violated"));
    }

    #[test]
    fn not_an_archive_is_render_error() {
        let err = restyle_runs(b"plain text", &DocxStyle::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RenderError);
    }

    #[test]
    fn pandoc_renders_one_paragraph_per_line() {
        if PANDOC.resolve(None).is_err() {
            println!("SKIP — pandoc not available");
            return;
        }
        let docx = render_docx_blocking("# Title\nLine A\nLine B", &ConversionConfig::default())
            .unwrap();
        let xml = document_xml(&docx);
        let paragraphs = xml.matches("<w:p>").count() + xml.matches("<w:p ").count();
        assert_eq!(paragraphs, 3, "{xml}");
        assert!(xml.contains("Line A") && xml.contains("Line B"));
        assert_eq!(xml.matches("<w:r>").count(), xml.matches(FORCED).count());
    }
}
