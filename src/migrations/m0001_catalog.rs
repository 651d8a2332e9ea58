use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_catalog_schema")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    company TEXT NOT NULL,
    title TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    year TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL UNIQUE
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS blog_content (
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
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS pdf_files (
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
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_blog_content_quality ON blog_content(extraction_quality)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_data_company ON data(company)",
        ))
}
