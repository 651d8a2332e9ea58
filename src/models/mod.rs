//! Data models for blogharvest.

mod article;
mod catalog;

pub use article::{
    ExtractionAttempt, ExtractionMethod, ExtractionResult, ImageRecord, QualityTier,
    FAILURE_SENTINEL, FAILURE_TITLE, USABLE_TEXT_LEN,
};
pub use catalog::{ArticleRequest, CatalogEntry, PdfEntry, MIN_LEDGER_CONTENT_LEN};
