//! OCR extraction for raster images via tesseract.
//!
//! The fetched bytes are decoded with the `image` crate first, so a corrupt
//! upload fails with a `DecodeError` before any engine is started. The
//! decoded raster is re-encoded as PNG (lossless, and a format every
//! tesseract build reads) and piped to `tesseract stdin stdout`.

use super::Extractor;
use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::FormatTag;
use crate::pipeline::fetch::FetchedDocument;
use crate::pipeline::tools::{self, TESSERACT};
use image::DynamicImage;
use std::io::Cursor;
use tracing::{debug, info};

pub struct ImageExtractor;

impl Extractor for ImageExtractor {
    fn format(&self) -> FormatTag {
        FormatTag::Image
    }

    fn extract(
        &self,
        document: &FetchedDocument,
        config: &ConversionConfig,
    ) -> Result<String, DocpipeError> {
        let img = decode(&document.bytes)?;
        info!("Image decoded: {}x{}", img.width(), img.height());
        let png = encode_png(&img)?;

        let program = TESSERACT.resolve(config.tesseract_path.as_deref())?;
        let output = TESSERACT.run(
            &program,
            &["stdin", "stdout", "-l", &config.ocr_language],
            &png,
        )?;

        if !output.status.success() {
            let diagnostic = tools::diagnostic(&output);
            // Missing traineddata is an installation problem, not a bad image.
            if diagnostic.contains("Failed loading language") {
                return Err(DocpipeError::EngineUnavailable {
                    engine: TESSERACT.name.to_string(),
                    hint: format!(
                        "{diagnostic}\nInstall the '{}' language pack (e.g. tesseract-ocr-{})",
                        config.ocr_language, config.ocr_language
                    ),
                });
            }
            return Err(DocpipeError::parse(FormatTag::Image, diagnostic));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR produced {} chars", text.len());
        Ok(text)
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, DocpipeError> {
    image::load_from_memory(bytes).map_err(|e| DocpipeError::Decode {
        detail: e.to_string(),
    })
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, DocpipeError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| DocpipeError::Internal(format!("PNG re-encode: {e}")))?;
    Ok(buf)
}
