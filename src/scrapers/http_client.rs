//! HTTP client for article pages, images, and PDF downloads.
//!
//! Wraps a shared reqwest client carrying the browser-like header profile
//! blog hosts expect, plus the adaptive per-domain rate limiter. Every
//! request acquires its domain slot before hitting the wire and reports the
//! status code back afterward so backoff state stays current.

use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::rate_limiter::RateLimiter;

/// Default desktop user agent presented to blog hosts.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fixed header profile sent with every request. Accept-Encoding is left to
/// reqwest's gzip/brotli support so decompression stays automatic.
fn standard_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// HTTP client with a browser-like header profile and adaptive rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(user_agent: &str, timeout: Duration, request_delay: Duration) -> Self {
        Self::with_rate_limiter(user_agent, timeout, request_delay, RateLimiter::new())
    }

    /// Create a new HTTP client with a shared rate limiter.
    pub fn with_rate_limiter(
        user_agent: &str,
        timeout: Duration,
        request_delay: Duration,
        rate_limiter: RateLimiter,
    ) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(standard_headers())
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            request_delay,
            rate_limiter,
        }
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Make a GET request with rate limiting and adaptive backoff reporting.
    pub async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    /// Make a GET request carrying extra per-request headers.
    pub async fn get_with_headers(
        &self,
        url: &str,
        extra: HeaderMap,
    ) -> Result<Response, reqwest::Error> {
        // Wait for rate limiter before making request
        let domain = self.rate_limiter.acquire(url).await;

        let response = self.client.get(url).headers(extra).send().await?;
        let status = response.status();

        // Report status to rate limiter for adaptive backoff
        if let Some(ref domain) = domain {
            self.report_status(domain, status).await;
        }

        // Apply base delay (rate limiter handles additional adaptive delay)
        tokio::time::sleep(self.request_delay).await;

        Ok(response)
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.get(url).await?.error_for_status()?;
        response.text().await
    }

    /// Get a resource as raw bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.get(url).await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn report_status(&self, domain: &str, status: StatusCode) {
        let code = status.as_u16();
        if code == 429 || code == 503 {
            self.rate_limiter.report_rate_limit(domain, code).await;
        } else if code >= 500 {
            self.rate_limiter.report_server_error(domain).await;
        } else if status.is_success() || code == 304 {
            self.rate_limiter.report_success(domain).await;
        } else {
            debug!("HTTP {} from {}, delay unchanged", code, domain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_headers_profile() {
        let headers = standard_headers();
        assert_eq!(
            headers.get(ACCEPT_LANGUAGE).unwrap(),
            HeaderValue::from_static("en-US,en;q=0.5")
        );
        assert_eq!(
            headers.get(UPGRADE_INSECURE_REQUESTS).unwrap(),
            HeaderValue::from_static("1")
        );
        assert!(headers.get(ACCEPT).is_some());
    }

    #[tokio::test]
    async fn test_client_builds_with_fresh_limiter() {
        let client = HttpClient::new(
            DEFAULT_USER_AGENT,
            Duration::from_secs(30),
            Duration::from_millis(0),
        );
        assert!(client.rate_limiter().get_stats().await.is_empty());
    }
}
