//! Plain-text extraction: decode the buffer in its declared encoding.
//!
//! The charset comes from the response's `Content-Type`; a byte-order mark
//! overrides it, and UTF-8 is assumed when neither says anything. The text
//! itself is returned verbatim.

use super::Extractor;
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use tracing::{debug, warn};

pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Txt
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        _config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let (encoding, body) = sniff(document);
        debug!("TXT: decoding {} bytes as {}", body.len(), encoding.name());
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .map(Cow::into_owned)
            .ok_or_else(|| {
                DocpipeError::parse(
                    FormatTag::Txt,
                    format!("bytes are not valid {}", encoding.name()),
                )
            })
    }
}

/// Pick the encoding for `document` and strip any BOM from its bytes.
pub(crate) fn sniff(document: &FetchedDocument) -> (&'static Encoding, &[u8]) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(&document.bytes) {
        return (encoding, &document.bytes[bom_len..]);
    }
    (declared_encoding(document), &document.bytes)
}

/// Encoding named by the `charset` parameter, or UTF-8.
fn declared_encoding(document: &FetchedDocument) -> &'static Encoding {
    match document.charset() {
        Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
            warn!("Unknown charset '{}' for {}, assuming UTF-8", label, document.url);
            UTF_8
        }),
        None => UTF_8,
    }
}

/// Decode `document`, replacing malformed sequences instead of failing.
pub(crate) fn decode_lenient(document: &FetchedDocument) -> String {
    let (encoding, body) = sniff(document);
    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        debug!("{}: malformed {} sequences replaced", document.url, encoding.name());
    }
    text.into_owned()
}
