//! Source fetching: turn a URL into an in-memory [`FetchedDocument`].
//!
//! Fetching is a collaborator of the core, not part of it, so it sits behind
//! the [`Fetcher`] capability. [`HttpFetcher`] is the production
//! implementation; tests hand the orchestrator a stub that serves fixtures
//! and counts calls. Either way a non-success status short-circuits the
//! request before any extraction strategy runs.

use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Bytes fetched for one request plus what the server declared about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: String,
    pub bytes: Vec<u8>,
    /// Raw `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
}

impl FetchedDocument {
    pub fn new(url: impl Into<String>, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            url: url.into(),
            bytes,
            content_type,
        }
    }

    /// The `charset` parameter of the declared content type, lower-cased.
    pub fn charset(&self) -> Option<String> {
        self.content_type.as_deref().and_then(parse_charset)
    }
}

static RE_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";\s]+)"?"#).unwrap());

/// Extract the `charset` parameter from a `Content-Type` value.
pub fn parse_charset(content_type: &str) -> Option<String> {
    RE_CHARSET
        .captures(content_type)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Capability: fetch the bytes behind a URL.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str)
        -> impl Future<Output = Result<FetchedDocument, DocpipeError>> + Send;
}

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: Option<u64>,
}

impl HttpFetcher {
    pub fn new(config: &ConversionConfig) -> Result<Self, DocpipeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DocpipeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: config.download_timeout_secs,
            max_bytes: config.max_download_bytes,
        })
    }

    fn failed(url: &str, reason: impl ToString) -> DocpipeError {
        DocpipeError::FetchFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> DocpipeError {
        if e.is_timeout() {
            DocpipeError::FetchTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            Self::failed(url, e)
        }
    }

    fn check_size(&self, url: &str, len: u64) -> Result<(), DocpipeError> {
        match self.max_bytes {
            Some(max) if len > max => Err(Self::failed(
                url,
                format!("body exceeds limit of {max} bytes (got {len})"),
            )),
            _ => Ok(()),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, DocpipeError> {
        if !is_url(url) || reqwest::Url::parse(url).is_err() {
            return Err(DocpipeError::InvalidUrl {
                input: url.to_string(),
            });
        }
        info!("Fetching: {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        if !response.status().is_success() {
            return Err(Self::failed(url, format!("HTTP {}", response.status())));
        }
        if let Some(len) = response.content_length() {
            self.check_size(url, len)?;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Chunked bodies carry no length up front, so the cap is enforced as data arrives.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(url, e))?
        {
            bytes.extend_from_slice(&chunk);
            self.check_size(url, bytes.len() as u64)?;
        }

        debug!(
            "Fetched {} bytes from {} ({})",
            bytes.len(),
            url,
            content_type.as_deref().unwrap_or("no content type")
        );
        Ok(FetchedDocument::new(url, bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("ftp://example.com/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn charset_parsing() {
        assert_eq!(
            parse_charset("text/plain; charset=ISO-8859-1").as_deref(),
            Some("iso-8859-1")
        );
        assert_eq!(
            parse_charset("text/html;charset=\"utf-8\"").as_deref(),
            Some("utf-8")
        );
        assert_eq!(parse_charset("application/pdf"), None);
    }

    #[test]
    fn fetched_document_charset() {
        let doc = FetchedDocument::new(
            "https://example.com/a.txt",
            b"hi".to_vec(),
            Some("text/plain; charset=windows-1252".into()),
        );
        assert_eq!(doc.charset().as_deref(), Some("windows-1252"));
    }

    #[tokio::test]
    async fn http_fetcher_rejects_non_urls() {
        let fetcher = HttpFetcher::new(&ConversionConfig::default()).unwrap();
        let err = fetcher.fetch("report.pdf").await.unwrap_err();
        assert!(matches!(err, DocpipeError::InvalidUrl { .. }));
    }

    /// Serve one chunked response on a local port. `chunks` of `chunk_size`
    /// bytes are written, or an endless stream when `chunks` is `None`.
    async fn serve_chunked(chunk_size: usize, chunks: Option<usize>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let mut chunk = format!("{chunk_size:x}\r\n").into_bytes();
            chunk.extend(std::iter::repeat(b'a').take(chunk_size));
            chunk.extend_from_slice(b"\r\n");
            let mut sent = 0;
            while chunks.map_or(true, |n| sent < n) {
                if socket.write_all(&chunk).await.is_err() {
                    return;
                }
                sent += 1;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        format!("http://{addr}/big.txt")
    }

    #[tokio::test]
    async fn chunked_body_over_cap_fails_early() {
        let url = serve_chunked(1024, None).await;
        let config = ConversionConfig::builder()
            .max_download_bytes(10)
            .download_timeout_secs(30)
            .build()
            .unwrap();
        let fetcher = HttpFetcher::new(&config).unwrap();

        let start = std::time::Instant::now();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(
            matches!(err, DocpipeError::FetchFailed { ref reason, .. } if reason.contains("exceeds limit")),
            "unexpected error: {err}"
        );
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn chunked_body_within_cap_is_read_whole() {
        let url = serve_chunked(16, Some(3)).await;
        let config = ConversionConfig::builder()
            .max_download_bytes(64)
            .build()
            .unwrap();
        let doc = HttpFetcher::new(&config).unwrap().fetch(&url).await.unwrap();
        assert_eq!(doc.bytes, vec![b'a'; 48]);
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn size_cap() {
        let config = ConversionConfig::builder()
            .max_download_bytes(10)
            .build()
            .unwrap();
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert!(fetcher.check_size("https://example.com/a.pdf", 10).is_ok());
        assert!(fetcher.check_size("https://example.com/a.pdf", 11).is_err());
    }
}
