//! Configuration types for extraction and rendering.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. A config carries no per-request state, so a
//! single instance can be shared by any number of concurrent conversions.

use crate::error::DocpipeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for extraction and rendering requests.
///
/// # Example
/// ```rust
/// use docpipe::{ConversionConfig, ParagraphSeparator};
///
/// let config = ConversionConfig::builder()
///     .download_timeout_secs(30)
///     .paragraph_separator(ParagraphSeparator::Newline)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Timeout for fetching a source document, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// User-Agent header sent with every fetch. Default: `docpipe/<version>`.
    pub user_agent: String,

    /// Reject fetched bodies larger than this many bytes. Default: None (no cap).
    pub max_download_bytes: Option<u64>,

    /// How extracted segments (pages, paragraphs, shapes) are joined. Default: Native.
    ///
    /// PDF and DOCX join with a space, PPTX terminates every shape with a
    /// newline, webpages join paragraphs with a newline. Callers rely on those
    /// shapes today; `Space` or `Newline` normalizes every extractor instead.
    pub paragraph_separator: ParagraphSeparator,

    /// Treat a single newline in Markdown as a hard line break (`<br>`). Default: true.
    pub hard_line_breaks: bool,

    /// Fixed run style forced onto every run of a rendered DOCX.
    pub docx_style: DocxStyle,

    /// Tesseract language pack used for OCR. Default: "eng".
    pub ocr_language: String,

    /// Explicit path to the tesseract binary. Default: looked up on PATH.
    pub tesseract_path: Option<PathBuf>,

    /// Explicit path to the pandoc binary. Default: looked up on PATH.
    pub pandoc_path: Option<PathBuf>,

    /// Explicit path to the wkhtmltopdf binary. Default: looked up on PATH.
    pub wkhtmltopdf_path: Option<PathBuf>,

    /// Explicit path to the pdfium shared library. Default: `PDFIUM_LIB_PATH`,
    /// then the system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Maximum number of references converted at once by
    /// [`crate::convert::extract_many`]. Default: 4.
    pub concurrency: usize,

    /// Optional stage observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 120,
            user_agent: concat!("docpipe/", env!("CARGO_PKG_VERSION")).to_string(),
            max_download_bytes: None,
            paragraph_separator: ParagraphSeparator::default(),
            hard_line_breaks: true,
            docx_style: DocxStyle::default(),
            ocr_language: "eng".to_string(),
            tesseract_path: None,
            pandoc_path: None,
            wkhtmltopdf_path: None,
            pdfium_library_path: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("paragraph_separator", &self.paragraph_separator)
            .field("hard_line_breaks", &self.hard_line_breaks)
            .field("docx_style", &self.docx_style)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("pandoc_path", &self.pandoc_path)
            .field("wkhtmltopdf_path", &self.wkhtmltopdf_path)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = Some(bytes);
        self
    }

    pub fn paragraph_separator(mut self, sep: ParagraphSeparator) -> Self {
        self.config.paragraph_separator = sep;
        self
    }

    pub fn hard_line_breaks(mut self, v: bool) -> Self {
        self.config.hard_line_breaks = v;
        self
    }

    pub fn docx_style(mut self, style: DocxStyle) -> Self {
        self.config.docx_style = style;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = Some(path.into());
        self
    }

    pub fn wkhtmltopdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wkhtmltopdf_path = Some(path.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocpipeError> {
        let c = &self.config;
        if c.download_timeout_secs == 0 {
            return Err(DocpipeError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.docx_style.font_family.trim().is_empty() {
            return Err(DocpipeError::InvalidConfig(
                "DOCX font family must not be empty".into(),
            ));
        }
        // w:sz is stored in half-points and Word caps it at 1638 pt.
        if !(1.0..=1638.0).contains(&c.docx_style.font_size_pt) {
            return Err(DocpipeError::InvalidConfig(format!(
                "DOCX font size must be 1–1638 pt, got {}",
                c.docx_style.font_size_pt
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(DocpipeError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DocpipeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums / value types ──────────────────────────────────────────────────

/// How extracted text segments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParagraphSeparator {
    /// Per-format rule: space for PDF/DOCX, newline terminator for PPTX
    /// shapes, newline separator for webpage paragraphs. (default)
    #[default]
    Native,
    /// Join every segment with a single space.
    Space,
    /// Join every segment with a single newline.
    Newline,
}

/// Font forced onto every run by the DOCX restyling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocxStyle {
    /// Font family written to `w:rFonts`. Default: "Calibri".
    pub font_family: String,
    /// Font size in points written to `w:sz`. Default: 11.
    pub font_size_pt: f32,
}

impl Default for DocxStyle {
    fn default() -> Self {
        Self {
            font_family: "Calibri".to_string(),
            font_size_pt: 11.0,
        }
    }
}

impl DocxStyle {
    pub fn new(font_family: impl Into<String>, font_size_pt: f32) -> Self {
        Self {
            font_family: font_family.into(),
            font_size_pt,
        }
    }

    /// Size in half-points, the unit of `w:sz`.
    pub fn half_points(&self) -> u32 {
        (self.font_size_pt * 2.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.download_timeout_secs, 120);
        assert_eq!(c.paragraph_separator, ParagraphSeparator::Native);
        assert!(c.hard_line_breaks);
        assert_eq!(c.docx_style.font_family, "Calibri");
        assert_eq!(c.docx_style.half_points(), 22);
        assert!(c.user_agent.starts_with("docpipe/"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConversionConfig::builder()
            .download_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn builder_rejects_bad_font_size() {
        let err = ConversionConfig::builder()
            .docx_style(DocxStyle::new("Arial", 0.0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("font size"));
    }

    #[test]
    fn half_points_rounds() {
        assert_eq!(DocxStyle::new("Arial", 10.5).half_points(), 21);
        assert_eq!(DocxStyle::new("Arial", 12.0).half_points(), 24);
    }

    #[test]
    fn concurrency_is_clamped() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }
}
