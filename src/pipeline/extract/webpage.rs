//! Webpage extraction: text of every `<p>` element, in document order.
//!
//! Parsing goes through html5ever's tree builder, which applies the HTML5
//! error-recovery rules, so malformed markup never fails the request.
//! Bytes are decoded leniently for the same reason.

use super::text::decode_lenient;
use super::{join_segments, Extractor, NativeJoin};
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::debug;

pub struct WebpageExtractor;

impl Extractor for WebpageExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Webpage
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let html = decode_lenient(document);
        let paragraphs = paragraph_texts(&html);
        debug!("Webpage: {} paragraphs", paragraphs.len());
        Ok(join_segments(
            &paragraphs,
            NativeJoin::Separator("\n"),
            config.paragraph_separator,
        ))
    }
}

/// Text content of each `<p>` element.
pub(crate) fn paragraph_texts(html: &str) -> Vec<String> {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let mut out = Vec::new();
    collect_paragraphs(&dom.document, &mut out);
    out
}

fn collect_paragraphs(node: &Handle, out: &mut Vec<String>) {
    if let NodeData::Element { ref name, .. } = node.data {
        if &*name.local == "p" {
            let mut text = String::new();
            text_content(node, &mut text);
            out.push(text);
            return;
        }
    }
    for child in node.children.borrow().iter() {
        collect_paragraphs(child, out);
    }
}

fn text_content(node: &Handle, out: &mut String) {
    for child in node.children.borrow().iter() {
        match child.data {
            NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
            NodeData::Element { .. } => text_content(child, out),
            _ => {}
        }
    }
}
