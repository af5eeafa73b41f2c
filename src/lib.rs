//! # docpipe
//!
//! Turn documents into text, and Markdown into documents.
//!
//! Two pipelines share one set of building blocks:
//!
//! - **Extraction**: fetch a PDF, DOCX, PPTX, plain-text, image or HTML
//!   source and flatten it to a single string. The format is chosen from the
//!   reference's suffix (or implied by the entry point, for webpages).
//! - **Rendering**: turn Markdown into a styled PDF (comrak + wkhtmltopdf)
//!   or into a DOCX whose runs all carry one fixed font (pandoc + a run
//!   restyling pass).
//!
//! ## Pipeline Overview
//!
//! ```text
//! reference
//!  │
//!  ├─ 1. Classify  suffix → FormatTag (unknown fails here, before any I/O)
//!  ├─ 2. Fetch     HTTP GET into memory (reqwest)
//!  └─ 3. Extract   pdfium │ zip+quick-xml │ encoding_rs │ tesseract │ html5ever
//!
//! markdown
//!  ├─ pdf   comrak → styled HTML → wkhtmltopdf
//!  └─ docx  normalize lines → pandoc → restyle every run
//! ```
//!
//! Every request is independent and the strategies hold no state, so any
//! number of conversions may run at once. Results cross the boundary as an
//! [`Outcome`]: text, a rendered document, or an error message.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docpipe::{extract, render_docx, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!
//!     let text = extract("https://example.com/report.pdf", &config).await?;
//!     println!("{text}");
//!
//!     let doc = render_docx("# Title\nLine A\nLine B", &config).await?;
//!     std::fs::write(&doc.file_name, &doc.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpipe` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docpipe = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Engines
//!
//! | Engine | Needed for | Located via |
//! |--------|------------|-------------|
//! | pdfium | `.pdf` extraction | `PDFIUM_LIB_PATH`, then the system library path |
//! | tesseract | image OCR | `DOCPIPE_TESSERACT`, then `PATH` |
//! | wkhtmltopdf | Markdown → PDF | `DOCPIPE_WKHTMLTOPDF`, then `PATH` |
//! | pandoc | Markdown → DOCX | `DOCPIPE_PANDOC`, then `PATH` |
//!
//! [`engine_status`] reports which of them resolve.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod outcome;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DocxStyle, ParagraphSeparator};
pub use convert::{
    extract, extract_many, extract_many_with, extract_sync, extract_webpage, extract_webpage_with,
    extract_with, handle, handle_with, render, render_docx, render_pdf, render_sync, Request,
};
pub use error::{DocpipeError, ErrorKind};
pub use format::{classify, FormatTag};
pub use outcome::{MediaType, Outcome, Payload, RenderedDocument};
pub use pipeline::fetch::{FetchedDocument, Fetcher, HttpFetcher};
pub use pipeline::tools::{engine_status, EngineStatus};
pub use progress::{ConversionProgressCallback, ProgressCallback, Stage};
