//! Network boundary: HTTP fetches, adaptive rate limiting, rendered pages.

pub mod browser;
pub mod http_client;
pub mod rate_limiter;

pub use browser::{BrowserFetcher, BrowserSettings, RenderedPage};
pub use http_client::{HttpClient, DEFAULT_USER_AGENT};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
