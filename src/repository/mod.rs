//! Repository layer for catalog persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking over
//! SQLite, driven asynchronously through diesel-async's
//! `SyncConnectionWrapper`.

pub mod catalog;
pub mod context;
pub mod discovery;
pub mod models;
pub mod pdfs;
pub mod pool;

pub use catalog::CatalogRepository;
pub use context::DbContext;
pub use discovery::DiscoveryRepository;
pub use pdfs::PdfRepository;
pub use pool::{DbError, SqlitePool};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
