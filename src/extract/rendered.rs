//! Rendered-DOM strategy: paragraph walk over a browser-rendered page.
//!
//! Last strategy in the cascade, used when the raw HTML carries no readable
//! content because the page builds its body client-side. Operates on the
//! serialized DOM the pipeline captured from a live page, so the walk itself
//! stays a pure parse.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::models::ExtractionMethod;
use crate::utils::squash_whitespace;

use super::{
    body_text, extract_title, scan_document_images, ExtractionStrategy, SelectorTry,
    StrategyOutcome, StrategySource, MAX_IMAGE_REFS,
};

/// Paragraph containers tried in priority order.
pub const PARAGRAPH_SELECTORS: &[&str] = &[
    "article p",
    "div.post-content p",
    "div.content p",
    "div.entry-content p",
    "main p",
    "div.blog-content p",
    "p",
];

/// Class-substring probes for images hidden behind generated class names.
pub const IMAGE_SELECTORS: &[&str] = &[
    r#"img[class*="image"]"#,
    r#"img[class*="img"]"#,
    r#"img[class*="photo"]"#,
    r#"img[class*="picture"]"#,
    r#"img[class*="media"]"#,
    r#"img[class*="asset"]"#,
    r#"img[class*="banner"]"#,
    r#"img[class*="hero"]"#,
    r#"img[class*="cover"]"#,
];

pub struct RenderedStrategy;

#[async_trait]
impl ExtractionStrategy for RenderedStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Rendered
    }

    fn needs_rendered_document(&self) -> bool {
        true
    }

    async fn attempt(&self, source: &StrategySource<'_>) -> StrategyOutcome {
        let Some(html) = source.rendered_html else {
            return StrategyOutcome::failed(vec!["no rendered document available".to_string()]);
        };
        parse_rendered(html)
    }
}

fn parse_rendered(html: &str) -> StrategyOutcome {
    let document = Html::parse_document(html);
    let mut outcome = StrategyOutcome {
        title: extract_title(&document),
        image_refs: scan_document_images(&document, IMAGE_SELECTORS, MAX_IMAGE_REFS),
        ..StrategyOutcome::default()
    };

    for selector_str in PARAGRAPH_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| squash_whitespace(&p.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        let matched = !paragraphs.is_empty();
        outcome.selector_tries.push(SelectorTry {
            selector: selector_str.to_string(),
            matched,
        });
        if matched {
            outcome.winning_selector = Some(selector_str.to_string());
            outcome.text = paragraphs.join("\n\n");
            return outcome;
        }
    }

    // No paragraphs anywhere; take the whole body text.
    outcome.errors.push("no paragraph selector matched, using body text".to_string());
    outcome.text = body_text(&document, &["script", "style"]);
    outcome
}
