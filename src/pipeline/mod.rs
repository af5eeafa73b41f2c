//! Pipeline stages for extraction and rendering.
//!
//! Each submodule implements exactly one transformation step and holds no
//! per-request state, so every stage can be called from many concurrent
//! requests and tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extract:  fetch ──▶ extract::<format>
//!           (HTTP)    (pdfium / zip+xml / encoding_rs / tesseract / html5ever)
//!
//! render:   markdown ──▶ pdf        (comrak → wkhtmltopdf)
//!           docx                    (normalize → pandoc → restyle runs)
//! ```
//!
//! 1. [`fetch`]    — download the source bytes; the only stage with network I/O
//! 2. [`extract`]  — one strategy per format tag, all blocking
//! 3. [`markdown`] — Markdown → styled HTML
//! 4. [`pdf`]      — HTML → PDF through wkhtmltopdf
//! 5. [`docx`]     — Markdown → DOCX through pandoc, then the run restyling pass
//!
//! [`tools`] locates and drives the external engines the stages share.

pub mod docx;
pub mod extract;
pub mod fetch;
pub mod markdown;
pub mod pdf;
pub mod tools;
