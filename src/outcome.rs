//! Result types handed to the boundary layer.
//!
//! The core produces either normalized text or a [`RenderedDocument`]; the
//! boundary only distinguishes success from failure. [`Outcome`] is that
//! flattened shape, serialising to `{"text": ...}`, a document object, or
//! `{"error": ...}` with exactly one of them populated.

use crate::error::DocpipeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Serialize, Serializer};
use std::fmt;

/// Media type of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Pdf,
    Docx,
}

impl MediaType {
    /// The exact MIME string sent to callers.
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Suggested download name for the payload.
    pub fn file_name(self) -> &'static str {
        match self {
            MediaType::Pdf => "output.pdf",
            MediaType::Docx => "output.docx",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mime())
    }
}

/// A rendered binary document plus its declared media type and file name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedDocument {
    pub media_type: MediaType,
    pub file_name: String,
    #[serde(rename = "data_base64", serialize_with = "serialize_base64")]
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    pub fn new(media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            media_type,
            file_name: media_type.file_name().to_string(),
            bytes,
        }
    }
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// A successful result: extracted text or a rendered document.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Document(RenderedDocument),
}

/// The uniform result shape consumed by the boundary layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Text { text: String },
    Document(RenderedDocument),
    Failure { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failure { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failure { error } => Some(error),
            _ => None,
        }
    }
}

impl From<Payload> for Outcome {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Outcome::Text { text },
            Payload::Document(doc) => Outcome::Document(doc),
        }
    }
}

impl From<Result<Payload, DocpipeError>> for Outcome {
    fn from(result: Result<Payload, DocpipeError>) -> Self {
        match result {
            Ok(payload) => payload.into(),
            Err(e) => Outcome::Failure {
                error: e.to_string(),
            },
        }
    }
}
