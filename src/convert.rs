//! Orchestrator: the entry points that drive one request from reference to
//! [`Outcome`].
//!
//! ## Extraction
//!
//! ```text
//! Idle ─▶ Classifying ─▶ Fetching ─▶ Extracting ─▶ Done
//!             │              │            │
//!             └──────────────┴────────────┴──▶ Failed
//! ```
//!
//! Classification runs before the fetch, so an `unknown` reference fails
//! without touching the network. The webpage entry point skips
//! classification (the endpoint is the format selector) and starts at
//! `Fetching`. Rendering goes `Idle ─▶ Rendering ─▶ Done | Failed`.
//!
//! All blocking work (pdfium, archive parsing, external engines) runs on
//! tokio's blocking pool, mirroring how pdfium must never run on an async
//! worker thread.

use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use crate::format::{classify, FormatTag};
use crate::outcome::{MediaType, Outcome, Payload, RenderedDocument};
use crate::pipeline::extract::extractor_for;
use crate::pipeline::fetch::{Fetcher, HttpFetcher};
use crate::pipeline::{docx, pdf};
use crate::progress::{Stage, StageTracker};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Label reported to progress callbacks for rendering requests.
const MARKDOWN_REFERENCE: &str = "<markdown>";

/// One inbound request, as the boundary layer sees it.
///
/// ```json
/// {"kind": "extract", "url": "https://example.com/report.pdf"}
/// {"kind": "render_docx", "markdown": "# Title\nLine A"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    /// Fetch a document and extract its text; format from the URL suffix.
    Extract { url: String },
    /// Fetch an HTML page and extract its paragraph text.
    Webpage { url: String },
    RenderPdf { markdown: String },
    RenderDocx { markdown: String },
}

impl Request {
    /// Markdown and target type for the render variants; `None` when the
    /// request needs a fetch.
    fn render_target(&self) -> Option<(&str, MediaType)> {
        match self {
            Request::RenderPdf { markdown } => Some((markdown, MediaType::Pdf)),
            Request::RenderDocx { markdown } => Some((markdown, MediaType::Docx)),
            Request::Extract { .. } | Request::Webpage { .. } => None,
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Fetch `reference` over HTTP and extract its text.
///
/// The format is chosen from the reference's suffix (see [`classify`]).
///
/// # Errors
/// - [`DocpipeError::UnsupportedFormat`] for an unrecognised suffix (no fetch is made)
/// - fetch errors ([`DocpipeError::FetchFailed`], [`DocpipeError::FetchTimeout`], …)
/// - the strategy's own parse/decode/engine errors
pub async fn extract(reference: &str, config: &ConversionConfig) -> Result<String, DocpipeError> {
    let fetcher = HttpFetcher::new(config)?;
    extract_with(&fetcher, reference, config).await
}

/// [`extract`] with a caller-supplied [`Fetcher`].
pub async fn extract_with<F: Fetcher>(
    fetcher: &F,
    reference: &str,
    config: &ConversionConfig,
) -> Result<String, DocpipeError> {
    run_extraction(fetcher, reference, None, config).await
}

/// Fetch an HTML page and return the text of its paragraphs.
pub async fn extract_webpage(url: &str, config: &ConversionConfig) -> Result<String, DocpipeError> {
    let fetcher = HttpFetcher::new(config)?;
    extract_webpage_with(&fetcher, url, config).await
}

/// [`extract_webpage`] with a caller-supplied [`Fetcher`].
pub async fn extract_webpage_with<F: Fetcher>(
    fetcher: &F,
    url: &str,
    config: &ConversionConfig,
) -> Result<String, DocpipeError> {
    run_extraction(fetcher, url, Some(FormatTag::Webpage), config).await
}

async fn run_extraction<F: Fetcher>(
    fetcher: &F,
    reference: &str,
    forced: Option<FormatTag>,
    config: &ConversionConfig,
) -> Result<String, DocpipeError> {
    let start = Instant::now();
    info!("Extracting: {}", reference);

    let mut tracker = StageTracker::new(reference, config.progress_callback.as_ref());
    let result = extraction_stages(&mut tracker, fetcher, reference, forced, config).await;
    let result = tracker.finish(result);

    if let Ok(ref text) = result {
        info!(
            "Extracted {} chars from {} in {}ms",
            text.len(),
            reference,
            start.elapsed().as_millis()
        );
    }
    result
}

async fn extraction_stages<F: Fetcher>(
    tracker: &mut StageTracker<'_>,
    fetcher: &F,
    reference: &str,
    forced: Option<FormatTag>,
    config: &ConversionConfig,
) -> Result<String, DocpipeError> {
    let tag = match forced {
        Some(tag) => tag,
        None => {
            tracker.advance(Stage::Classifying)?;
            classify(reference)
        }
    };
    let extractor = extractor_for(tag).ok_or_else(|| DocpipeError::UnsupportedFormat {
        reference: reference.to_string(),
    })?;

    tracker.advance(Stage::Fetching)?;
    let document = fetcher.fetch(reference).await?;

    tracker.advance(Stage::Extracting)?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || extractor.extract(&document, &config))
        .await
        .map_err(|e| DocpipeError::Internal(format!("{tag} extraction task failed: {e}")))?
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render Markdown to a styled PDF.
pub async fn render_pdf(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<RenderedDocument, DocpipeError> {
    render(markdown, MediaType::Pdf, config).await
}

/// Render Markdown to a DOCX whose runs all carry the configured font.
pub async fn render_docx(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<RenderedDocument, DocpipeError> {
    render(markdown, MediaType::Docx, config).await
}

/// Render Markdown to the requested media type.
pub async fn render(
    markdown: &str,
    media_type: MediaType,
    config: &ConversionConfig,
) -> Result<RenderedDocument, DocpipeError> {
    let start = Instant::now();
    info!("Rendering {} chars of Markdown to {}", markdown.len(), media_type);

    let mut tracker = StageTracker::new(MARKDOWN_REFERENCE, config.progress_callback.as_ref());
    let result = rendering_stage(&mut tracker, markdown, media_type, config).await;
    let result = tracker.finish(result);

    if let Ok(ref doc) = result {
        info!(
            "Rendered {} ({} bytes) in {}ms",
            doc.file_name,
            doc.bytes.len(),
            start.elapsed().as_millis()
        );
    }
    result
}

async fn rendering_stage(
    tracker: &mut StageTracker<'_>,
    markdown: &str,
    media_type: MediaType,
    config: &ConversionConfig,
) -> Result<RenderedDocument, DocpipeError> {
    tracker.advance(Stage::Rendering)?;
    let markdown = markdown.to_string();
    let config = config.clone();
    let bytes = tokio::task::spawn_blocking(move || match media_type {
        MediaType::Pdf => pdf::render_pdf_blocking(&markdown, &config),
        MediaType::Docx => docx::render_docx_blocking(&markdown, &config),
    })
    .await
    .map_err(|e| DocpipeError::Internal(format!("{media_type} render task failed: {e}")))??;
    Ok(RenderedDocument::new(media_type, bytes))
}

// ── Boundary entry ───────────────────────────────────────────────────────

/// Handle one boundary request and flatten the result into an [`Outcome`].
pub async fn handle(request: Request, config: &ConversionConfig) -> Outcome {
    if let Some((markdown, media_type)) = request.render_target() {
        return Outcome::from(render(markdown, media_type, config).await.map(Payload::Document));
    }
    match HttpFetcher::new(config) {
        Ok(fetcher) => handle_with(&fetcher, request, config).await,
        Err(e) => Outcome::from(Err::<Payload, _>(e)),
    }
}

/// [`handle`] with a caller-supplied [`Fetcher`].
pub async fn handle_with<F: Fetcher>(
    fetcher: &F,
    request: Request,
    config: &ConversionConfig,
) -> Outcome {
    let result = match request {
        Request::Extract { url } => extract_with(fetcher, &url, config).await.map(Payload::Text),
        Request::Webpage { url } => extract_webpage_with(fetcher, &url, config)
            .await
            .map(Payload::Text),
        Request::RenderPdf { markdown } => render(&markdown, MediaType::Pdf, config)
            .await
            .map(Payload::Document),
        Request::RenderDocx { markdown } => render(&markdown, MediaType::Docx, config)
            .await
            .map(Payload::Document),
    };
    Outcome::from(result)
}

// ── Batch / sync helpers ─────────────────────────────────────────────────

/// Extract several references concurrently, at most `config.concurrency`
/// at a time. Results come back in input order; one failure never affects
/// the others.
pub async fn extract_many<I, S>(
    references: I,
    config: &ConversionConfig,
) -> Result<Vec<(String, Result<String, DocpipeError>)>, DocpipeError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fetcher = HttpFetcher::new(config)?;
    Ok(extract_many_with(&fetcher, references, config).await)
}

/// [`extract_many`] with a caller-supplied [`Fetcher`].
pub async fn extract_many_with<F, I, S>(
    fetcher: &F,
    references: I,
    config: &ConversionConfig,
) -> Vec<(String, Result<String, DocpipeError>)>
where
    F: Fetcher,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut results: Vec<(usize, String, Result<String, DocpipeError>)> = stream::iter(
        references.into_iter().map(Into::into).enumerate(),
    )
    .map(|(idx, reference): (usize, String)| async move {
        let result = extract_with(fetcher, &reference, config).await;
        (idx, reference, result)
    })
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|(idx, _, _)| *idx);
    results
        .into_iter()
        .map(|(_, reference, result)| (reference, result))
        .collect()
}

fn runtime() -> Result<tokio::runtime::Runtime, DocpipeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocpipeError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(reference: &str, config: &ConversionConfig) -> Result<String, DocpipeError> {
    runtime()?.block_on(extract(reference, config))
}

/// Synchronous wrapper around [`render`].
///
/// Creates a temporary tokio runtime internally.
pub fn render_sync(
    markdown: &str,
    media_type: MediaType,
    config: &ConversionConfig,
) -> Result<RenderedDocument, DocpipeError> {
    runtime()?.block_on(render(markdown, media_type, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_json_shape() {
        let req: Request =
            serde_json::from_str(r#"{"kind":"extract","url":"https://example.com/a.pdf"}"#)
                .unwrap();
        assert_eq!(
            req,
            Request::Extract {
                url: "https://example.com/a.pdf".into()
            }
        );
        let json = serde_json::to_string(&Request::RenderDocx {
            markdown: "# T".into(),
        })
        .unwrap();
        assert_eq!(json, r##"{"kind":"render_docx","markdown":"# T"}"##);
    }

    #[test]
    fn unsupported_suffix_fails_synchronously_without_network() {
        let err = extract_sync("https://example.com/archive.xyz", &ConversionConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn render_requests_do_not_need_an_http_client() {
        // A header-invalid user agent makes the HTTP client fail to build.
        let config = ConversionConfig::builder()
            .user_agent("bad\nagent")
            .pandoc_path("/nonexistent/pandoc")
            .build()
            .unwrap();

        let rendered = handle(
            Request::RenderDocx {
                markdown: "# Title".into(),
            },
            &config,
        )
        .await;
        assert!(rendered.error().unwrap().contains("pandoc"), "{rendered:?}");

        let fetched = handle(
            Request::Extract {
                url: "https://example.com/a.txt".into(),
            },
            &config,
        )
        .await;
        assert!(fetched.error().unwrap().contains("HTTP client"), "{fetched:?}");
    }

    #[tokio::test]
    async fn render_without_engine_is_engine_unavailable() {
        let config = ConversionConfig::builder()
            .pandoc_path("/nonexistent/pandoc")
            .build()
            .unwrap();
        let err = render_docx("# Title", &config).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EngineUnavailable);
    }
}
