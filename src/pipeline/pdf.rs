//! Markdown → PDF: styled HTML piped through wkhtmltopdf.

use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::pipeline::markdown::styled_html;
use crate::pipeline::tools::{self, WKHTMLTOPDF};
use tracing::info;

const WKHTMLTOPDF_ARGS: &[&str] = &["--quiet", "--encoding", "utf-8", "-", "-"];

/// Render Markdown to PDF bytes. Blocking.
pub fn render_pdf_blocking(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<Vec<u8>, DocpipeError> {
    let html = styled_html(markdown, config.hard_line_breaks);
    let program = WKHTMLTOPDF.resolve(config.wkhtmltopdf_path.as_deref())?;
    let output = WKHTMLTOPDF.run(&program, WKHTMLTOPDF_ARGS, html.as_bytes())?;

    if !output.status.success() {
        return Err(DocpipeError::render("wkhtmltopdf", tools::diagnostic(&output)));
    }
    if !output.stdout.starts_with(b"%PDF") {
        return Err(DocpipeError::render(
            "wkhtmltopdf",
            format!("produced no PDF ({} bytes)", output.stdout.len()),
        ));
    }

    info!("Rendered PDF: {} bytes", output.stdout.len());
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_wkhtmltopdf_is_engine_unavailable() {
        let config = ConversionConfig::builder()
            .wkhtmltopdf_path("/nonexistent/wkhtmltopdf")
            .build()
            .unwrap();
        let err = render_pdf_blocking("# Title", &config).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EngineUnavailable);
    }

    #[test]
    fn renders_when_wkhtmltopdf_is_installed() {
        let config = ConversionConfig::default();
        if WKHTMLTOPDF.resolve(None).is_err() {
            println!("SKIP — wkhtmltopdf not available");
            return;
        }
        let pdf = render_pdf_blocking("| a | b |\n|---|---|\n| 1 | 2 |\n\nline\nbreak", &config)
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
