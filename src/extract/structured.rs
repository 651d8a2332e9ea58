//! Structured article strategy: boilerplate parse plus selector sweep.
//!
//! First strategy in the cascade. Works entirely on the raw fetched HTML,
//! assuming common article markup. When the `<article>` boilerplate parse
//! comes up short it falls through four sweeps in order: named content
//! selectors, obfuscated class-name selectors, largest text block, and a
//! line filter over the stripped body.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::models::ExtractionMethod;

use super::{
    body_text, extract_title, joined_text, scan_document_images, ExtractionStrategy, RawImageRef,
    SelectorTry, StrategyOutcome, StrategySource, MAX_IMAGE_REFS, MIN_CANDIDATE_LEN,
};

/// Content containers tried in priority order.
pub const CONTENT_SELECTORS: &[&str] = &[
    "main",
    ".post-content",
    ".entry-content",
    ".blog-content",
    ".content",
    r#"[role="main"]"#,
    ".post-body",
    ".article-body",
    ".blog-post",
    ".post",
    ".entry",
    ".markdown-body",
    ".blog-article",
    ".post-content-wrapper",
    ".content-wrapper",
    "article",
    ".blog-post-content",
    ".article-content",
    ".post-text",
    ".entry-text",
    ".content-text",
];

/// Last-resort class-substring selectors for obfuscated markup.
pub const GENERIC_CONTENT_SELECTORS: &[&str] = &[
    r#"div[class*="content"]"#,
    r#"div[class*="post"]"#,
    r#"div[class*="article"]"#,
    r#"div[class*="text"]"#,
    r#"div[class*="body"]"#,
    r#"div[class*="main"]"#,
    r#"section[class*="content"]"#,
    r#"section[class*="post"]"#,
];

/// Minimum joined text for a named/generic selector match to be accepted.
const MIN_SELECTOR_LEN: usize = 100;

/// Minimum element text for the largest-block sweep to consider it.
const MIN_BLOCK_LEN: usize = 20;

/// Minimum line length kept by the body-line sweep.
const MIN_LINE_LEN: usize = 50;

/// Minimum total text for the block and body-line sweeps to accept.
const MIN_SWEEP_LEN: usize = 500;

/// Tags stripped before the body-line sweep.
const CHROME_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

pub struct StructuredStrategy;

#[async_trait]
impl ExtractionStrategy for StructuredStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Structured
    }

    async fn attempt(&self, source: &StrategySource<'_>) -> StrategyOutcome {
        let Some(html) = source.raw_html else {
            return StrategyOutcome::failed(vec!["no fetched document available".to_string()]);
        };
        parse_structured(html)
    }
}

fn parse_structured(html: &str) -> StrategyOutcome {
    let document = Html::parse_document(html);
    let mut outcome = StrategyOutcome {
        title: extract_title(&document),
        image_refs: collect_images(&document),
        ..StrategyOutcome::default()
    };

    // Boilerplate pass: body text straight from the first article element.
    let article_sel = Selector::parse("article").unwrap();
    let mut text = document
        .select(&article_sel)
        .next()
        .map(|article| joined_text(&article))
        .unwrap_or_default();

    if text.chars().count() < MIN_CANDIDATE_LEN {
        outcome.errors.push(format!(
            "article boilerplate parse yielded {} chars, sweeping selectors",
            text.chars().count()
        ));
        text = sweep_content_selectors(&document, &mut outcome)
            .or_else(|| largest_text_block(&document))
            .or_else(|| body_line_sweep(&document))
            .unwrap_or(text);
    }

    outcome.text = text;
    outcome
}

/// The shared `<img>` scan, sized for the raw document.
fn collect_images(document: &Html) -> Vec<RawImageRef> {
    scan_document_images(document, &[], MAX_IMAGE_REFS)
}

/// First named or generic selector whose joined text clears the bar.
fn sweep_content_selectors(document: &Html, outcome: &mut StrategyOutcome) -> Option<String> {
    for selector_str in CONTENT_SELECTORS.iter().chain(GENERIC_CONTENT_SELECTORS) {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let found = document.select(&selector).next();
        let text = found.map(|el| joined_text(&el)).unwrap_or_default();
        let matched = text.chars().count() > MIN_SELECTOR_LEN;
        outcome.selector_tries.push(SelectorTry {
            selector: selector_str.to_string(),
            matched,
        });
        if matched {
            outcome.winning_selector = Some(selector_str.to_string());
            return Some(text);
        }
    }
    None
}

/// Largest single text block on the page, accepted only when substantial.
fn largest_text_block(document: &Html) -> Option<String> {
    let all = Selector::parse("body *").unwrap();
    let best = document
        .select(&all)
        .map(|el| joined_text(&el))
        .filter(|t| t.chars().count() > MIN_BLOCK_LEN)
        .max_by_key(|t| t.chars().count())?;
    (best.chars().count() > MIN_SWEEP_LEN).then_some(best)
}

/// Long lines from the body after stripping chrome tags.
fn body_line_sweep(document: &Html) -> Option<String> {
    let stripped = body_text(document, CHROME_TAGS);
    let kept: Vec<&str> = stripped
        .lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_LINE_LEN)
        .collect();
    let text = kept.join("\n");
    (text.chars().count() > MIN_SWEEP_LEN).then_some(text)
}
