//! Error types for the docpipe library.
//!
//! Every failure is terminal for the request that produced it: nothing is
//! retried, and no partial text or document is returned alongside an error.
//!
//! * [`DocpipeError`] carries enough context (URL, format, engine, detail)
//!   to print a useful message, optionally with a hint line.
//! * [`ErrorKind`] is the closed, coarse classification of those errors.
//!   The boundary layer only ever sees the display string (see
//!   [`crate::outcome::Outcome`]), so callers must not match on message text.

use crate::format::FormatTag;
use serde::Serialize;
use thiserror::Error;

/// All errors returned by the docpipe library.
#[derive(Debug, Error)]
pub enum DocpipeError {
    // ── Classification ────────────────────────────────────────────────────
    /// The reference classified as `unknown`; no strategy and no fetch ran.
    #[error("Unsupported filetype: '{reference}'\nSupported suffixes: pdf, docx, pptx, txt, png, jpg, jpeg, gif, bmp.")]
    UnsupportedFormat { reference: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The reference is not an absolute HTTP/HTTPS URL.
    #[error("Invalid source '{input}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { input: String },

    /// Network GET failed or returned a non-success status.
    #[error("Failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// Network GET exceeded the configured timeout.
    #[error("Fetching '{url}' timed out after {secs}s\nIncrease --download-timeout.")]
    FetchTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A recognised format could not be decoded structurally.
    #[error("Failed to parse {format} document: {detail}")]
    Parse { format: FormatTag, detail: String },

    /// The image bytes are not a raster format we can decode.
    #[error("Failed to decode image: {detail}")]
    Decode { detail: String },

    /// An external engine (pdfium, tesseract, pandoc, wkhtmltopdf) is missing.
    #[error("{engine} is not available: {hint}")]
    EngineUnavailable { engine: String, hint: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The rendering stage failed after its input was accepted.
    #[error("{stage} failed: {detail}")]
    Render { stage: String, detail: String },

    // ── Config / internal ─────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (task join failure, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`DocpipeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    FetchError,
    ParseError,
    DecodeError,
    EngineUnavailable,
    RenderError,
    Internal,
}

impl DocpipeError {
    /// The [`ErrorKind`] this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocpipeError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            DocpipeError::InvalidUrl { .. }
            | DocpipeError::FetchFailed { .. }
            | DocpipeError::FetchTimeout { .. } => ErrorKind::FetchError,
            DocpipeError::Parse { .. } => ErrorKind::ParseError,
            DocpipeError::Decode { .. } => ErrorKind::DecodeError,
            DocpipeError::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            DocpipeError::Render { .. } => ErrorKind::RenderError,
            DocpipeError::InvalidConfig(_) | DocpipeError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn parse(format: FormatTag, detail: impl ToString) -> Self {
        DocpipeError::Parse {
            format,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn render(stage: &str, detail: impl ToString) -> Self {
        DocpipeError::Render {
            stage: stage.to_string(),
            detail: detail.to_string(),
        }
    }
}
