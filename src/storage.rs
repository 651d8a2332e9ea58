//! On-disk layout for harvested articles and PDFs.
//!
//! Every path the harvester writes is constructed here, so the extraction
//! pipeline, diagnostics writers, and CLI agree on where files land:
//!
//! ```text
//! {storage_dir}/blogs/{blog_id}/{blog_id}_{title}.txt
//! {storage_dir}/blogs/{blog_id}/images/image_000.jpg
//! {storage_dir}/blogs/{blog_id}/metadata.json
//! {storage_dir}/extraction_logs/{blog_id}_extraction_log.json
//! {storage_dir}/extraction_issues/{blog_id}_issues.json
//! {storage_dir}/extraction_issues/extraction_issues_summary.csv
//! {storage_dir}/pdfs/{pdf_id}_{title}.pdf
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ArticleRequest, ExtractionResult, ImageRecord};
use crate::utils::sanitize_filename;

/// Directory holding one article's text, images, and metadata.
pub fn blog_dir(storage_dir: &Path, blog_id: &str) -> PathBuf {
    storage_dir.join("blogs").join(blog_id)
}

/// Directory holding an article's downloaded images.
pub fn images_dir(storage_dir: &Path, blog_id: &str) -> PathBuf {
    blog_dir(storage_dir, blog_id).join("images")
}

/// Path of the article text file: `{blog_id}_{sanitized_title}.txt`.
pub fn text_file_path(storage_dir: &Path, blog_id: &str, title: &str) -> PathBuf {
    blog_dir(storage_dir, blog_id).join(format!("{}_{}.txt", blog_id, sanitize_filename(title)))
}

/// Path of the per-article metadata JSON.
pub fn metadata_path(storage_dir: &Path, blog_id: &str) -> PathBuf {
    blog_dir(storage_dir, blog_id).join("metadata.json")
}

/// Path of the per-article cascade trace.
pub fn extraction_log_path(storage_dir: &Path, blog_id: &str) -> PathBuf {
    storage_dir
        .join("extraction_logs")
        .join(format!("{}_extraction_log.json", blog_id))
}

/// Path of the per-article issues report.
pub fn issues_path(storage_dir: &Path, blog_id: &str) -> PathBuf {
    storage_dir
        .join("extraction_issues")
        .join(format!("{}_issues.json", blog_id))
}

/// Path of the append-only issues summary CSV shared by all articles.
pub fn issues_summary_path(storage_dir: &Path) -> PathBuf {
    storage_dir
        .join("extraction_issues")
        .join("extraction_issues_summary.csv")
}

/// Path of a saved PDF: `pdfs/{pdf_id}_{sanitized_title}.pdf`.
pub fn pdf_path(storage_dir: &Path, pdf_id: &str, title: &str) -> PathBuf {
    storage_dir
        .join("pdfs")
        .join(format!("{}_{}.pdf", pdf_id, sanitize_filename(title)))
}

/// Derive a local image filename: `image_{index:03}{ext}`.
///
/// The extension comes from the source URL's path (query strings never leak
/// into it); URLs without a usable extension fall back to `.jpg`.
pub fn image_filename(index: usize, source_url: &str) -> String {
    let ext = url::Url::parse(source_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        })
        .unwrap_or_else(|| ".jpg".to_string());
    format!("image_{:03}{}", index, ext)
}

/// Compose and write the article text file.
///
/// The file starts with a fixed key/value preamble, an `=` separator line,
/// and then the extracted body. Returns the path written.
pub fn write_article_text(
    storage_dir: &Path,
    request: &ArticleRequest,
    result: &ExtractionResult,
) -> anyhow::Result<PathBuf> {
    let blog_id = request.blog_id();
    let path = text_file_path(storage_dir, &blog_id, &request.title);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = String::new();
    out.push_str(&format!("Title: {}\n", request.title));
    out.push_str(&format!("Company: {}\n", request.company));
    out.push_str(&format!("Tags: {}\n", request.tags_joined()));
    out.push_str(&format!("Year: {}\n", request.year));
    out.push_str(&format!("URL: {}\n", request.url));
    out.push_str(&format!("Blog ID: {}\n", blog_id));
    out.push_str(&format!("Extraction Method: {}\n", result.method.as_str()));
    out.push_str(&"=".repeat(80));
    out.push_str("\n\n");
    out.push_str(&result.text);

    std::fs::write(&path, out)?;
    Ok(path)
}

/// Shape of `metadata.json`, correlating the catalog row with on-disk files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub blog_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub tags: Vec<String>,
    pub year: String,
    pub extraction_method: String,
    pub extraction_quality: String,
    pub content_length: usize,
    pub images: Vec<ImageRecord>,
    pub text_file_path: PathBuf,
    pub extracted_at: DateTime<Utc>,
}

/// Write `metadata.json` for an article. Returns the path written.
pub fn write_article_metadata(
    storage_dir: &Path,
    meta: &ArticleMetadata,
) -> anyhow::Result<PathBuf> {
    let path = metadata_path(storage_dir, &meta.blog_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(meta)?)?;
    Ok(path)
}

/// Write downloaded PDF bytes to their catalog location. Returns the path.
pub fn write_pdf_file(
    storage_dir: &Path,
    pdf_id: &str,
    title: &str,
    bytes: &[u8],
) -> anyhow::Result<PathBuf> {
    let path = pdf_path(storage_dir, pdf_id, title);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, bytes)?;
    Ok(path)
}
