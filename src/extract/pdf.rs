//! Direct PDF download path.
//!
//! Binary documents bypass the extraction cascade entirely. arXiv links get
//! a tuned request profile: the `/abs/` page is visited first to pick up
//! session cookies, and the binary fetch carries that page as referer. The
//! payload is accepted on its magic bytes alone, never on the HTTP status or
//! the declared content-type, since repositories are happy to serve an HTML
//! error page with a 200.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, REFERER};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::scrapers::HttpClient;

/// Attempts made before a PDF URL is abandoned.
pub const MAX_DOWNLOAD_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("payload is not a PDF (magic bytes missing)")]
    NotPdf,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// Whether a URL should take the PDF path instead of the cascade.
pub fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".pdf") || lower.contains("/pdf/") || is_arxiv_url(&lower)
}

fn is_arxiv_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|h| h == "arxiv.org" || h.ends_with(".arxiv.org"))
        })
        .unwrap_or(false)
}

/// Rewrite an arXiv abstract URL to its binary form.
fn arxiv_pdf_url(url: &str) -> String {
    url.replacen("/abs/", "/pdf/", 1)
}

/// The abstract page corresponding to an arXiv binary URL.
fn arxiv_abs_url(url: &str) -> String {
    url.replacen("/pdf/", "/abs/", 1)
        .trim_end_matches(".pdf")
        .to_string()
}

/// True when the leading bytes carry the PDF magic marker.
pub fn is_pdf_payload(bytes: &[u8]) -> bool {
    infer::get(bytes)
        .map(|kind| kind.mime_type() == "application/pdf")
        .unwrap_or(false)
}

pub struct PdfFetcher<'a> {
    client: &'a HttpClient,
}

impl<'a> PdfFetcher<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    /// Download and validate one PDF, retrying with randomized backoff.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, PdfError> {
        let arxiv = is_arxiv_url(&url.to_lowercase());
        let fetch_url = if arxiv {
            arxiv_pdf_url(url)
        } else {
            url.to_string()
        };

        let mut headers = HeaderMap::new();
        if arxiv {
            let abs_url = arxiv_abs_url(&fetch_url);
            if let Ok(value) = HeaderValue::from_str(&abs_url) {
                headers.insert(REFERER, value);
            }
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

            // Warm up cookies the way a human arriving via the abstract would
            match self.client.get(&abs_url).await {
                Ok(resp) => debug!("arXiv abstract visit: {}", resp.status()),
                Err(e) => debug!("arXiv abstract visit failed: {}", e),
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
            match self.fetch_once(&fetch_url, headers.clone()).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!(
                        "PDF attempt {}/{} failed for {}: {}",
                        attempt, MAX_DOWNLOAD_ATTEMPTS, fetch_url, e
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < MAX_DOWNLOAD_ATTEMPTS {
                let wait = rand::rng().random_range(2.0..5.0);
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }
        }

        Err(PdfError::Exhausted {
            attempts: MAX_DOWNLOAD_ATTEMPTS,
            last_error,
        })
    }

    async fn fetch_once(&self, url: &str, headers: HeaderMap) -> Result<Vec<u8>, PdfError> {
        let response = self.client.get_with_headers(url, headers).await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();
        if !is_pdf_payload(&bytes) {
            debug!(
                "non-PDF payload from {} (status {}, {} bytes)",
                url,
                status,
                bytes.len()
            );
            return Err(PdfError::NotPdf);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_url_detection() {
        assert!(is_pdf_url("https://example.com/papers/report.pdf"));
        assert!(is_pdf_url("https://example.com/papers/Report.PDF"));
        assert!(is_pdf_url("https://example.com/pdf/123"));
        assert!(is_pdf_url("https://arxiv.org/abs/2106.01345"));
        assert!(!is_pdf_url("https://example.com/blog/post"));
        // Only a real arxiv host routes, not a lookalike path
        assert!(!is_pdf_url("https://example.com/arxiv.org/post"));
    }

    #[test]
    fn test_arxiv_rewrites() {
        assert_eq!(
            arxiv_pdf_url("https://arxiv.org/abs/2106.01345"),
            "https://arxiv.org/pdf/2106.01345"
        );
        assert_eq!(
            arxiv_abs_url("https://arxiv.org/pdf/2106.01345.pdf"),
            "https://arxiv.org/abs/2106.01345"
        );
        assert_eq!(
            arxiv_abs_url("https://arxiv.org/pdf/2106.01345"),
            "https://arxiv.org/abs/2106.01345"
        );
    }

    #[test]
    fn test_magic_byte_gate() {
        assert!(is_pdf_payload(b"%PDF-1.7 trailing bytes"));
        // An HTML error page claiming to be a PDF is rejected
        assert!(!is_pdf_payload(b"<!DOCTYPE html><html><body>404</body></html>"));
        assert!(!is_pdf_payload(b""));
    }
}
