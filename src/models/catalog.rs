//! Catalog models: discovery rows, ledger entries, PDF entries.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::article::{ExtractionMethod, QualityTier};

/// Ledger entries shorter than this are treated as retry candidates even
/// when their tier says otherwise.
pub const MIN_LEDGER_CONTENT_LEN: i64 = 100;

/// One discovered article, as scraped from the index page.
///
/// Immutable once enqueued; identity for dedup purposes is the URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRequest {
    pub url: String,
    pub title: String,
    pub company: String,
    pub tags: Vec<String>,
    pub year: String,
}

impl ArticleRequest {
    pub fn new(url: String, title: String, company: String, tags: Vec<String>, year: String) -> Self {
        Self {
            url,
            title,
            company,
            tags,
            year,
        }
    }

    /// Deterministic id for this article: first 12 hex chars of the
    /// digest of `"{url}_{title}"`. Stable across runs and restarts.
    pub fn blog_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}", self.url, self.title).as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..12].to_string()
    }

    pub fn tags_joined(&self) -> String {
        self.tags.join(", ")
    }
}

/// One row of the idempotency ledger.
///
/// Keyed by `blog_id`; re-extraction of the same URL upserts rather than
/// inserting a duplicate.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub blog_id: String,
    pub title: String,
    pub company: String,
    pub tags: Vec<String>,
    pub year: String,
    pub url: String,
    pub content_length: i64,
    pub image_count: i64,
    pub text_file_path: Option<PathBuf>,
    pub images_dir_path: Option<PathBuf>,
    pub extraction_method: ExtractionMethod,
    pub extraction_quality: QualityTier,
    pub has_images: bool,
    pub has_embedded_links: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Ledger skip rule: a prior result is good enough to skip iff its tier
    /// is not `failed` and its stored content is longer than the minimum.
    pub fn is_skippable(&self) -> bool {
        self.extraction_quality.is_usable() && self.content_length > MIN_LEDGER_CONTENT_LEN
    }

    /// Retry candidates for `--test-problematic`: failed tier or low quality.
    pub fn is_problematic(&self) -> bool {
        matches!(
            self.extraction_quality,
            QualityTier::Failed | QualityTier::Low
        )
    }
}

/// One archived PDF document.
#[derive(Debug, Clone)]
pub struct PdfEntry {
    pub pdf_id: String,
    pub title: String,
    pub company: String,
    pub tags: Vec<String>,
    pub year: String,
    pub url: String,
    pub file_path: PathBuf,
    pub file_size: i64,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
}
