//! Extraction outcome models: methods, quality tiers, image records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel text stored when every extraction strategy fails.
pub const FAILURE_SENTINEL: &str = "EXTRACTION_FAILED_ALL_METHODS";

/// Title carried by the sentinel result.
pub const FAILURE_TITLE: &str = "Extraction Failed";

/// Minimum text length for an extraction to count as usable.
pub const USABLE_TEXT_LEN: usize = 500;

/// Which strategy produced an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Article-boilerplate parse over raw HTML.
    Structured,
    /// Content-density readability pass over raw HTML.
    Readable,
    /// Selector walk over the live rendered DOM.
    Rendered,
    /// No strategy succeeded.
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::Readable => "readable",
            ExtractionMethod::Rendered => "rendered",
            ExtractionMethod::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "structured" => Some(ExtractionMethod::Structured),
            "readable" => Some(ExtractionMethod::Readable),
            "rendered" => Some(ExtractionMethod::Rendered),
            "none" => Some(ExtractionMethod::None),
            _ => None,
        }
    }
}

/// Coarse quality label derived from which strategy passed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
    Failed,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
            QualityTier::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(QualityTier::High),
            "medium" => Some(QualityTier::Medium),
            "low" => Some(QualityTier::Low),
            "failed" => Some(QualityTier::Failed),
            _ => None,
        }
    }

    /// True for any tier produced by a passing strategy.
    pub fn is_usable(&self) -> bool {
        !matches!(self, QualityTier::Failed)
    }
}

/// One resolved article image.
///
/// `source_url` is always absolute; uniqueness within an article is by
/// `source_url`, and `index` numbers the download filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub source_url: String,
    /// Set once the image bytes have been written to disk.
    pub local_path: Option<PathBuf>,
    pub alt_text: String,
    pub caption: String,
    pub index: usize,
    /// Ordinal position of the element in the scanned document.
    pub approx_position: usize,
    /// Tag name of the enclosing container ("figure", "div", ...).
    pub container_kind: String,
    /// Byte size on disk, once downloaded.
    pub file_size: Option<u64>,
}

/// The winning (or sentinel-failed) extraction candidate.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub title: String,
    pub images: Vec<ImageRecord>,
    pub method: ExtractionMethod,
    pub tier: QualityTier,
}

impl ExtractionResult {
    /// The fixed stanza recorded when the whole cascade fails.
    pub fn sentinel() -> Self {
        Self {
            text: FAILURE_SENTINEL.to_string(),
            title: FAILURE_TITLE.to_string(),
            images: Vec::new(),
            method: ExtractionMethod::None,
            tier: QualityTier::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.tier == QualityTier::Failed
    }

    /// Character count persisted to the catalog; sentinel results count zero.
    pub fn content_length(&self) -> usize {
        if self.is_failed() {
            0
        } else {
            self.text.chars().count()
        }
    }
}

/// Record of one strategy invocation inside a cascade.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionAttempt {
    pub strategy: String,
    pub succeeded: bool,
    pub text_length: usize,
    pub image_ref_count: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_roundtrip() {
        for m in [
            ExtractionMethod::Structured,
            ExtractionMethod::Readable,
            ExtractionMethod::Rendered,
            ExtractionMethod::None,
        ] {
            assert_eq!(ExtractionMethod::from_str(m.as_str()), Some(m));
        }
        assert_eq!(ExtractionMethod::from_str("bogus"), None);
    }

    #[test]
    fn test_tier_roundtrip() {
        for t in [
            QualityTier::High,
            QualityTier::Medium,
            QualityTier::Low,
            QualityTier::Failed,
        ] {
            assert_eq!(QualityTier::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_tier_usability() {
        assert!(QualityTier::High.is_usable());
        assert!(QualityTier::Low.is_usable());
        assert!(!QualityTier::Failed.is_usable());
    }

    #[test]
    fn test_sentinel_invariant() {
        let s = ExtractionResult::sentinel();
        assert_eq!(s.text, FAILURE_SENTINEL);
        assert_eq!(s.title, FAILURE_TITLE);
        assert!(s.images.is_empty());
        assert_eq!(s.method, ExtractionMethod::None);
        assert!(s.is_failed());
    }
}
