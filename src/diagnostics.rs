//! Per-attempt extraction diagnostics.
//!
//! Two JSON artifacts per processed URL plus one appended row in a flat
//! summary table:
//!
//! ```text
//! storage/extraction_logs/<blogId>_extraction_log.json    cascade trace
//! storage/extraction_issues/<blogId>_issues.json          selector outcomes
//! storage/extraction_issues/extraction_issues_summary.csv one row per attempt
//! ```
//!
//! Each attempt writes fresh files; prior records are never updated. The
//! summary table makes failure-rate analysis a single-file read instead of
//! a walk over every article directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extract::{PipelineOutput, SelectorTry};
use crate::models::{ArticleRequest, ExtractionAttempt};
use crate::storage;

/// Cascade trace: which methods ran and how each fared.
#[derive(Debug, Serialize)]
pub struct ExtractionLog {
    pub blog_id: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub methods_tried: Vec<String>,
    pub methods_successful: Vec<String>,
    pub methods_failed: Vec<String>,
    pub attempts: Vec<ExtractionAttempt>,
    pub final_method: String,
    pub final_quality: String,
}

/// Selector-level outcomes and content counts for one attempt.
#[derive(Debug, Serialize)]
pub struct IssuesReport {
    pub blog_id: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub selector_tries: Vec<SelectorTry>,
    pub winning_selector: Option<String>,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub link_count: usize,
    pub supplemental_images_found: usize,
    pub errors: Vec<String>,
}

/// Persist the full diagnostic record for one processed URL.
pub fn record_extraction(
    storage_dir: &Path,
    blog_id: &str,
    request: &ArticleRequest,
    output: &PipelineOutput,
) -> Result<()> {
    let now = Utc::now();

    let log = ExtractionLog {
        blog_id: blog_id.to_string(),
        url: request.url.clone(),
        timestamp: now,
        methods_tried: method_names(&output.attempts, |_| true),
        methods_successful: method_names(&output.attempts, |a| a.succeeded),
        methods_failed: method_names(&output.attempts, |a| !a.succeeded),
        attempts: output.attempts.clone(),
        final_method: output.result.method.as_str().to_string(),
        final_quality: output.result.tier.as_str().to_string(),
    };
    let log_path = storage::extraction_log_path(storage_dir, blog_id);
    write_json(&log_path, &log)?;

    let text = &output.result.text;
    let issues = IssuesReport {
        blog_id: blog_id.to_string(),
        url: request.url.clone(),
        timestamp: now,
        selector_tries: output.selector_tries.clone(),
        winning_selector: output.winning_selector.clone(),
        paragraph_count: paragraph_count(text),
        image_count: output.result.images.len(),
        link_count: link_count(text),
        supplemental_images_found: output.supplemental_found,
        errors: output.errors.clone(),
    };
    let issues_path = storage::issues_path(storage_dir, blog_id);
    write_json(&issues_path, &issues)?;

    append_summary_row(storage_dir, blog_id, request, output, now)
}

fn method_names(attempts: &[ExtractionAttempt], keep: impl Fn(&ExtractionAttempt) -> bool) -> Vec<String> {
    attempts
        .iter()
        .filter(|a| keep(a))
        .map(|a| a.strategy.clone())
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// One appended CSV row per attempt; the header goes in on first creation.
fn append_summary_row(
    storage_dir: &Path,
    blog_id: &str,
    request: &ArticleRequest,
    output: &PipelineOutput,
    now: DateTime<Utc>,
) -> Result<()> {
    let path = storage::issues_summary_path(storage_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let new_file = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    if new_file {
        writeln!(
            file,
            "blog_id,url,extraction_method,quality_tier,content_length,image_count,error_count,timestamp"
        )?;
    }

    let error_count = output.errors.len()
        + output
            .attempts
            .iter()
            .map(|a| a.errors.len())
            .sum::<usize>();
    writeln!(
        file,
        "{},{},{},{},{},{},{},{}",
        blog_id,
        csv_field(&request.url),
        output.result.method.as_str(),
        output.result.tier.as_str(),
        output.result.content_length(),
        output.result.images.len(),
        error_count,
        now.to_rfc3339(),
    )?;
    Ok(())
}

/// Quote a field when it carries a comma or quote.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn paragraph_count(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

fn link_count(text: &str) -> usize {
    text.matches("http://").count() + text.matches("https://").count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::models::{ExtractionMethod, ExtractionResult, QualityTier};

    fn request() -> ArticleRequest {
        ArticleRequest::new(
            "https://example.com/post".to_string(),
            "Post".to_string(),
            "Example Co".to_string(),
            vec![],
            "2024".to_string(),
        )
    }

    fn output(tier: QualityTier) -> PipelineOutput {
        let result = if tier == QualityTier::Failed {
            ExtractionResult::sentinel()
        } else {
            ExtractionResult {
                text: "Body text with https://example.com/link inside.\n\nSecond paragraph."
                    .to_string(),
                title: "Post".to_string(),
                images: vec![],
                method: ExtractionMethod::Structured,
                tier,
            }
        };
        PipelineOutput {
            result,
            attempts: vec![ExtractionAttempt {
                strategy: "structured".to_string(),
                succeeded: tier != QualityTier::Failed,
                text_length: 64,
                image_ref_count: 0,
                errors: vec!["note".to_string()],
            }],
            selector_tries: vec![SelectorTry {
                selector: ".post-content".to_string(),
                matched: true,
            }],
            winning_selector: Some(".post-content".to_string()),
            supplemental_found: 2,
            errors: vec![],
        }
    }

    #[test]
    fn test_record_writes_both_json_artifacts() {
        let dir = tempdir().unwrap();
        record_extraction(dir.path(), "abc123def456", &request(), &output(QualityTier::High))
            .unwrap();

        let log: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(storage::extraction_log_path(dir.path(), "abc123def456"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(log["final_quality"], "high");
        assert_eq!(log["methods_successful"][0], "structured");

        let issues: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(storage::issues_path(dir.path(), "abc123def456")).unwrap(),
        )
        .unwrap();
        assert_eq!(issues["winning_selector"], ".post-content");
        assert_eq!(issues["paragraph_count"], 2);
        assert_eq!(issues["link_count"], 1);
        assert_eq!(issues["supplemental_images_found"], 2);
    }

    #[test]
    fn test_summary_header_written_once() {
        let dir = tempdir().unwrap();
        record_extraction(dir.path(), "aaa", &request(), &output(QualityTier::High)).unwrap();
        record_extraction(dir.path(), "bbb", &request(), &output(QualityTier::Failed)).unwrap();

        let csv = std::fs::read_to_string(storage::issues_summary_path(dir.path())).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("blog_id,url,"));
        assert!(lines[1].starts_with("aaa,"));
        assert!(lines[2].starts_with("bbb,"));
        // Failed rows carry the sentinel bookkeeping: zero length, tier failed
        assert!(lines[2].contains(",none,failed,0,0,"));
    }
}
