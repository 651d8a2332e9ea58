//! Database context for managing the connection pool and repository access.
//!
//! Provides the single entry point for catalog operations. Create one context
//! per command or service, then use it to reach every repository.
//!
//! # Example
//! ```ignore
//! let ctx = DbContext::new(&db_path, &storage_dir);
//! ctx.init_schema().await?;
//! let pending = ctx.discovery().all().await?;
//! ```

use std::path::{Path, PathBuf};

use diesel_async::SimpleAsyncConnection;

use super::catalog::CatalogRepository;
use super::discovery::DiscoveryRepository;
use super::pdfs::PdfRepository;
use super::pool::{DbError, SqlitePool};

/// Database context that owns the pool and hands out repositories.
#[derive(Clone)]
pub struct DbContext {
    pool: SqlitePool,
    storage_dir: PathBuf,
}

impl DbContext {
    /// Create a new database context from a database file path.
    pub fn new(db_path: &Path, storage_dir: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
            storage_dir: storage_dir.to_path_buf(),
        }
    }

    /// Create a new database context from a database URL
    /// (`sqlite:path/to/db` or a bare file path).
    pub fn from_url(database_url: &str, storage_dir: &Path) -> Self {
        Self {
            pool: SqlitePool::new(database_url),
            storage_dir: storage_dir.to_path_buf(),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Root directory for article text, images, diagnostics, and PDFs.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get a discovery repository.
    pub fn discovery(&self) -> DiscoveryRepository {
        DiscoveryRepository::new(self.pool.clone())
    }

    /// Get a catalog (ledger) repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Get a PDF repository.
    pub fn pdfs(&self) -> PdfRepository {
        PdfRepository::new(self.pool.clone())
    }

    /// Initialize the catalog schema.
    ///
    /// Creates the tables if they don't exist. The DDL here matches the
    /// cetane migrations applied by `blogh db migrate`; the parity test in
    /// `tests/schema_parity.rs` keeps the two from drifting.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        conn.batch_execute(
            r#"
            -- Raw discovery rows
            CREATE TABLE IF NOT EXISTS data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL,
                title TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE
            );

            -- Extraction ledger
            CREATE TABLE IF NOT EXISTS blog_content (
                blog_id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE,
                content_length BIGINT NOT NULL DEFAULT 0,
                image_count BIGINT NOT NULL DEFAULT 0,
                text_file_path TEXT,
                images_dir_path TEXT,
                extraction_method TEXT NOT NULL DEFAULT 'none',
                extraction_quality TEXT NOT NULL DEFAULT 'failed',
                has_images BOOLEAN NOT NULL DEFAULT 0,
                has_embedded_links BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Archived PDFs
            CREATE TABLE IF NOT EXISTS pdf_files (
                pdf_id TEXT PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '',
                year TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                file_size BIGINT NOT NULL DEFAULT 0,
                file_type TEXT NOT NULL DEFAULT 'pdf',
                created_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_blog_content_quality ON blog_content(extraction_quality);
            CREATE INDEX IF NOT EXISTS idx_data_company ON data(company);
            "#,
        )
        .await
    }

    /// Get the list of user tables in the database.
    pub async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<TableName> = diesel_async::RunQueryDsl::load(
            diesel::sql_query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            ),
            &mut conn,
        )
        .await?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}

#[derive(diesel::QueryableByName)]
struct TableName {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_schema_and_repos() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        let storage_dir = dir.path().join("storage");

        let ctx = DbContext::new(&db_path, &storage_dir);
        ctx.init_schema().await.unwrap();

        let tables = ctx.list_tables().await.unwrap();
        assert!(tables.contains(&"data".to_string()));
        assert!(tables.contains(&"blog_content".to_string()));
        assert!(tables.contains(&"pdf_files".to_string()));

        assert_eq!(ctx.discovery().count().await.unwrap(), 0);
        assert_eq!(ctx.catalog().count().await.unwrap(), 0);
        assert_eq!(ctx.pdfs().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_init_schema_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");

        let ctx = DbContext::new(&db_path, dir.path());
        ctx.init_schema().await.unwrap();
        ctx.init_schema().await.unwrap();
    }
}
