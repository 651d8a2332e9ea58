//! Repository for the extraction ledger (`blog_content` table).
//!
//! One row per article, keyed by blog id. Saves are `REPLACE INTO` upserts,
//! so re-extraction overwrites the prior row instead of duplicating it.

use std::path::PathBuf;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{split_tags, CatalogRecord, NewCatalogRow};
use super::parse_datetime;
use super::pool::{DbError, SqlitePool};
use crate::models::{CatalogEntry, ExtractionMethod, QualityTier};
use crate::schema::blog_content;

impl From<CatalogRecord> for CatalogEntry {
    fn from(record: CatalogRecord) -> Self {
        CatalogEntry {
            blog_id: record.blog_id,
            title: record.title,
            company: record.company,
            tags: split_tags(&record.tags),
            year: record.year,
            url: record.url,
            content_length: record.content_length,
            image_count: record.image_count,
            text_file_path: record.text_file_path.map(PathBuf::from),
            images_dir_path: record.images_dir_path.map(PathBuf::from),
            extraction_method: ExtractionMethod::from_str(&record.extraction_method)
                .unwrap_or(ExtractionMethod::None),
            extraction_quality: QualityTier::from_str(&record.extraction_quality)
                .unwrap_or(QualityTier::Failed),
            has_images: record.has_images,
            has_embedded_links: record.has_embedded_links,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Diesel-based ledger repository with compile-time query checking.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Create a new catalog repository with an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a ledger entry by blog id.
    pub async fn get(&self, blog_id: &str) -> Result<Option<CatalogEntry>, DbError> {
        let mut conn = self.pool.get().await?;

        blog_content::table
            .find(blog_id)
            .first::<CatalogRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(CatalogEntry::from))
    }

    /// Get a ledger entry by article URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<CatalogEntry>, DbError> {
        let mut conn = self.pool.get().await?;

        blog_content::table
            .filter(blog_content::url.eq(url))
            .first::<CatalogRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(CatalogEntry::from))
    }

    /// Save a ledger entry (insert or overwrite by primary key).
    pub async fn save(&self, entry: &CatalogEntry) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let tags = entry.tags.join(", ");
        let text_file_path = entry
            .text_file_path
            .as_ref()
            .map(|p| p.display().to_string());
        let images_dir_path = entry
            .images_dir_path
            .as_ref()
            .map(|p| p.display().to_string());
        let created_at = entry.created_at.to_rfc3339();
        let updated_at = entry.updated_at.to_rfc3339();

        // Use replace_into for SQLite upsert
        diesel::replace_into(blog_content::table)
            .values(&NewCatalogRow {
                blog_id: &entry.blog_id,
                title: &entry.title,
                company: &entry.company,
                tags: &tags,
                year: &entry.year,
                url: &entry.url,
                content_length: entry.content_length,
                image_count: entry.image_count,
                text_file_path: text_file_path.as_deref(),
                images_dir_path: images_dir_path.as_deref(),
                extraction_method: entry.extraction_method.as_str(),
                extraction_quality: entry.extraction_quality.as_str(),
                has_images: entry.has_images,
                has_embedded_links: entry.has_embedded_links,
                created_at: &created_at,
                updated_at: &updated_at,
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Count all ledger entries.
    pub async fn count(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        blog_content::table.select(count_star()).first(&mut conn).await
    }

    /// Count entries with a given quality tier.
    pub async fn count_by_quality(&self, tier: QualityTier) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        blog_content::table
            .filter(blog_content::extraction_quality.eq(tier.as_str()))
            .select(count_star())
            .first(&mut conn)
            .await
    }

    /// Entries worth retrying: failed extraction or low-quality content.
    pub async fn problematic(&self) -> Result<Vec<CatalogEntry>, DbError> {
        let mut conn = self.pool.get().await?;

        blog_content::table
            .filter(blog_content::extraction_quality.eq_any(["failed", "low"]))
            .load::<CatalogRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(CatalogEntry::from).collect())
    }
}
