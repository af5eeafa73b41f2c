//! Extraction strategies: one per [`FormatTag`], each turning a fetched
//! buffer into flattened text.
//!
//! Strategies are stateless unit structs behind the [`Extractor`]
//! capability and are looked up through [`extractor_for`], a static table
//! keyed by the closed tag enum. Adding a format means adding a variant, so
//! the compiler points at every place that needs a decision.
//!
//! ## Join rules
//!
//! | Format  | Segment   | Native join |
//! |---------|-----------|-------------|
//! | pdf     | page      | `" "` between segments |
//! | docx    | paragraph | `" "` between segments |
//! | pptx    | shape     | `"\n"` after every segment |
//! | webpage | `<p>`     | `"\n"` between segments |
//! | txt     | —         | verbatim |
//! | image   | —         | verbatim OCR output |
//!
//! [`ParagraphSeparator::Space`] / [`ParagraphSeparator::Newline`] replace
//! the native rule with a plain separator for every segmented format.

pub mod docx;
pub mod image;
pub mod pdf;
pub mod pptx;
pub mod text;
pub mod webpage;

use crate::config::{ConversionConfig, ParagraphSeparator};
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;

/// Capability implemented by every extraction strategy.
///
/// Implementations are blocking and hold no state; the orchestrator calls
/// them from `spawn_blocking`.
pub trait Extractor: Send + Sync {
    fn format(&self) -> FormatTag;

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError>;
}

static PDF: pdf::PdfExtractor = pdf::PdfExtractor;
static DOCX: docx::DocxExtractor = docx::DocxExtractor;
static PPTX: pptx::PptxExtractor = pptx::PptxExtractor;
static TXT: text::TextExtractor = text::TextExtractor;
static IMAGE: image::ImageExtractor = image::ImageExtractor;
static WEBPAGE: webpage::WebpageExtractor = webpage::WebpageExtractor;

/// The strategy registered for `tag`, or `None` for [`FormatTag::Unknown`].
pub fn extractor_for(tag: FormatTag) -> Option<&'static dyn Extractor> {
    match tag {
        FormatTag::Pdf => Some(&PDF),
        FormatTag::Docx => Some(&DOCX),
        FormatTag::Pptx => Some(&PPTX),
        FormatTag::Txt => Some(&TXT),
        FormatTag::Image => Some(&IMAGE),
        FormatTag::Webpage => Some(&WEBPAGE),
        FormatTag::Unknown => None,
    }
}

/// How a format natively combines its segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeJoin {
    /// Placed between segments.
    Separator(&'static str),
    /// Appended after every segment.
    Terminator(&'static str),
}

/// Combine extracted segments according to the format's native rule or
/// the configured override. Empty segments are kept as empty segments.
pub(crate) fn join_segments(
    segments: &[String],
    native: NativeJoin,
    separator: ParagraphSeparator,
) -> String {
    match (separator, native) {
        (ParagraphSeparator::Space, _) => segments.join(" "),
        (ParagraphSeparator::Newline, _) => segments.join("\n"),
        (ParagraphSeparator::Native, NativeJoin::Separator(sep)) => segments.join(sep),
        (ParagraphSeparator::Native, NativeJoin::Terminator(term)) => {
            let mut out = String::new();
            for segment in segments {
                out.push_str(segment);
                out.push_str(term);
            }
            out
        }
    }
}

/// Strip a namespace prefix from a qualified XML name (`w:p` → `p`).
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}
