//! Diesel ORM models for the catalog tables.
//!
//! Record structs mirror the column order in `schema.rs`; the `New*`
//! counterparts are borrowed views used for inserts and upserts.

use diesel::prelude::*;

use crate::schema;

/// Raw discovery row from the `data` table.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::data)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DiscoveredRowRecord {
    pub id: i32,
    pub company: String,
    pub title: String,
    pub tags: String,
    pub year: String,
    pub url: String,
}

/// New discovery row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::data)]
pub struct NewDiscoveredRow<'a> {
    pub company: &'a str,
    pub title: &'a str,
    pub tags: &'a str,
    pub year: &'a str,
    pub url: &'a str,
}

/// Extraction ledger row from the `blog_content` table.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::blog_content)]
#[diesel(primary_key(blog_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CatalogRecord {
    pub blog_id: String,
    pub title: String,
    pub company: String,
    pub tags: String,
    pub year: String,
    pub url: String,
    pub content_length: i64,
    pub image_count: i64,
    pub text_file_path: Option<String>,
    pub images_dir_path: Option<String>,
    pub extraction_method: String,
    pub extraction_quality: String,
    pub has_images: bool,
    pub has_embedded_links: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// New ledger row for upsert.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::blog_content)]
pub struct NewCatalogRow<'a> {
    pub blog_id: &'a str,
    pub title: &'a str,
    pub company: &'a str,
    pub tags: &'a str,
    pub year: &'a str,
    pub url: &'a str,
    pub content_length: i64,
    pub image_count: i64,
    pub text_file_path: Option<&'a str>,
    pub images_dir_path: Option<&'a str>,
    pub extraction_method: &'a str,
    pub extraction_quality: &'a str,
    pub has_images: bool,
    pub has_embedded_links: bool,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Saved PDF row from the `pdf_files` table.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::pdf_files)]
#[diesel(primary_key(pdf_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PdfRecord {
    pub pdf_id: String,
    pub title: String,
    pub company: String,
    pub tags: String,
    pub year: String,
    pub url: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub created_at: String,
}

/// New PDF row for upsert.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::pdf_files)]
pub struct NewPdfRow<'a> {
    pub pdf_id: &'a str,
    pub title: &'a str,
    pub company: &'a str,
    pub tags: &'a str,
    pub year: &'a str,
    pub url: &'a str,
    pub file_path: &'a str,
    pub file_size: i64,
    pub file_type: &'a str,
    pub created_at: &'a str,
}

/// Split a comma-joined tags column back into individual tags.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
