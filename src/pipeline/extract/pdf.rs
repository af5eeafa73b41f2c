//! PDF text extraction via pdfium.
//!
//! The document is loaded straight from the fetched bytes; pdfium never sees
//! a file path. Page text comes back in document order and is joined with a
//! single space, so an empty page contributes an empty segment (two adjacent
//! spaces) rather than disappearing.

use super::{join_segments, Extractor, NativeJoin};
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Pdf
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let pdfium = bind_pdfium(config)?;
        let pages = page_texts(&pdfium, &document.bytes)?;
        Ok(join_segments(
            &pages,
            NativeJoin::Separator(" "),
            config.paragraph_separator,
        ))
    }
}

/// Library location from the config or `PDFIUM_LIB_PATH`, if any.
pub(crate) fn configured_library_path(config: &ConversionConfig) -> Option<PathBuf> {
    config
        .pdfium_library_path
        .clone()
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from))
}

/// Bind to pdfium: configured path (file or directory), else the system library.
pub(crate) fn bind_pdfium(config: &ConversionConfig) -> Result<Pdfium, DocpipeError> {
    let bindings = match configured_library_path(config) {
        Some(path) => {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| DocpipeError::EngineUnavailable {
        engine: "pdfium".to_string(),
        hint: format!(
            "{e}\nInstall libpdfium or set PDFIUM_LIB_PATH=/path/to/libpdfium \
             (builds: https://github.com/bblanchon/pdfium-binaries)."
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Text of every page, in document order.
fn page_texts(pdfium: &Pdfium, bytes: &[u8]) -> Result<Vec<String>, DocpipeError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| DocpipeError::parse(FormatTag::Pdf, e))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    pages
        .iter()
        .enumerate()
        .map(|(idx, page)| {
            let text = page.text().map_err(|e| {
                DocpipeError::parse(FormatTag::Pdf, format!("page {}: {e}", idx + 1))
            })?;
            Ok(text.all().replace("\r\n", "\n"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_prefers_config() {
        let config = ConversionConfig::builder()
            .pdfium_library_path("/opt/pdfium/lib/libpdfium.so")
            .build()
            .unwrap();
        assert_eq!(
            configured_library_path(&config),
            Some(PathBuf::from("/opt/pdfium/lib/libpdfium.so"))
        );
    }

    #[test]
    fn missing_library_is_engine_unavailable() {
        let config = ConversionConfig::builder()
            .pdfium_library_path("/nonexistent/libpdfium.so")
            .build()
            .unwrap();
        let err = bind_pdfium(&config).err().expect("bind must fail");
        assert_eq!(err.kind(), crate::error::ErrorKind::EngineUnavailable);
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let Ok(pdfium) = bind_pdfium(&ConversionConfig::default()) else {
            println!("SKIP — pdfium not available");
            return;
        };
        let err = page_texts(&pdfium, b"definitely not a pdf").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }
}
