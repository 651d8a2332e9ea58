//! Readable-document strategy: content-density pass over raw HTML.
//!
//! Second strategy in the cascade. Runs a Readability-style reduction over
//! the fetched document, which strips navigation and page chrome that the
//! structured sweep sometimes drags in. Contributes no image references;
//! those come from the other strategies and the supplementation scan.

use async_trait::async_trait;
use dom_smoothie::Readability;

use crate::models::ExtractionMethod;
use crate::utils::collapse_blank_lines;

use super::{ExtractionStrategy, StrategyOutcome, StrategySource, MIN_CANDIDATE_LEN};

pub struct ReadableStrategy;

#[async_trait]
impl ExtractionStrategy for ReadableStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Readable
    }

    async fn attempt(&self, source: &StrategySource<'_>) -> StrategyOutcome {
        let Some(html) = source.raw_html else {
            return StrategyOutcome::failed(vec!["no fetched document available".to_string()]);
        };
        parse_readable(html)
    }
}

fn parse_readable(html: &str) -> StrategyOutcome {
    let mut reader = match Readability::new(html.to_string(), None, None) {
        Ok(reader) => reader,
        Err(e) => {
            return StrategyOutcome::failed(vec![format!("readability init failed: {}", e)]);
        }
    };

    let article = match reader.parse() {
        Ok(article) => article,
        Err(e) => {
            return StrategyOutcome::failed(vec![format!("readability parse failed: {}", e)]);
        }
    };

    let raw: String = article.text_content.into();
    let text = collapse_blank_lines(raw.trim());
    if text.chars().count() < MIN_CANDIDATE_LEN {
        return StrategyOutcome::failed(vec![format!(
            "readable content below minimum ({} chars)",
            text.chars().count()
        )]);
    }

    let title = article.title.trim().to_string();
    StrategyOutcome {
        text,
        title: (!title.is_empty()).then_some(title),
        ..StrategyOutcome::default()
    }
}
