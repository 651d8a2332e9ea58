//! Content extraction: the strategy cascade and its supporting passes.
//!
//! Three strategies are tried strictly in order against each article URL,
//! stopping at the first one whose text passes the usability gate:
//!
//! 1. [`StructuredStrategy`]: boilerplate parse plus selector sweep over the
//!    raw fetched HTML.
//! 2. [`ReadableStrategy`]: content-density readability pass over the same
//!    HTML.
//! 3. [`RenderedStrategy`]: paragraph walk over the serialized DOM of a
//!    live browser page.
//!
//! Strategies are pure functions over already-fetched documents; all network
//! and browser I/O belongs to [`ExtractionPipeline`], which drives the
//! cascade, harvests images, and runs the post-cascade supplementation scan.

pub mod images;
pub mod pdf;
pub mod pipeline;
pub mod readable;
pub mod rendered;
pub mod structured;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::models::ExtractionMethod;
use crate::utils::squash_whitespace;

pub use images::ImageResolver;
pub use pdf::{is_pdf_url, PdfError, PdfFetcher};
pub use pipeline::{ExtractionPipeline, PipelineOutput};
pub use readable::ReadableStrategy;
pub use rendered::RenderedStrategy;
pub use structured::StructuredStrategy;

/// Minimum text length for a strategy-internal parse to count at all.
/// Below this the strategy keeps falling through its own sub-methods.
pub(crate) const MIN_CANDIDATE_LEN: usize = 50;

/// Maximum raw image references collected per document scan.
pub(crate) const MAX_IMAGE_REFS: usize = 10;

/// An `<img>` reference as found in markup, before absolutization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageRef {
    pub src: String,
    pub alt: String,
    pub caption: String,
    /// Ordinal position in the document scan.
    pub position: usize,
    /// Tag name of the enclosing container.
    pub container: String,
}

/// One selector probe and whether it matched anything.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SelectorTry {
    pub selector: String,
    pub matched: bool,
}

/// What one strategy produced for one article.
///
/// An empty `text` means the strategy failed outright; non-empty text below
/// the usability gate is a sub-threshold candidate whose images are still
/// worth harvesting.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub text: String,
    pub title: Option<String>,
    pub image_refs: Vec<RawImageRef>,
    pub selector_tries: Vec<SelectorTry>,
    /// Selector that produced the accepted text, when one did.
    pub winning_selector: Option<String>,
    pub errors: Vec<String>,
}

impl StrategyOutcome {
    /// Outright failure with recorded reasons.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }
}

/// Documents available to a strategy, fetched once by the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySource<'a> {
    pub url: &'a str,
    /// Raw HTML from a plain HTTP fetch.
    pub raw_html: Option<&'a str>,
    /// Serialized DOM after scripts ran, when a browser page was opened.
    pub rendered_html: Option<&'a str>,
}

/// One extraction strategy in the cascade.
///
/// Implementations must never propagate a fault that would abort the
/// cascade; every internal error is folded into the outcome's error list.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Which method label this strategy reports under.
    fn method(&self) -> ExtractionMethod;

    /// Whether this strategy needs the serialized rendered DOM.
    /// The pipeline opens a browser page lazily the first time this is true.
    fn needs_rendered_document(&self) -> bool {
        false
    }

    /// Produce a candidate for one article.
    async fn attempt(&self, source: &StrategySource<'_>) -> StrategyOutcome;
}

/// The three production strategies in cascade order.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StructuredStrategy),
        Box::new(ReadableStrategy),
        Box::new(RenderedStrategy),
    ]
}

/// Join an element's text nodes with newlines, dropping empty chunks.
pub(crate) fn joined_text(element: &ElementRef) -> String {
    let chunks: Vec<&str> = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    chunks.join("\n")
}

/// Body text with the given container tags excluded.
pub(crate) fn body_text(document: &Html, excluded: &[&str]) -> String {
    let body_sel = Selector::parse("body").unwrap();
    let Some(body) = document.select(&body_sel).next() else {
        return String::new();
    };

    let mut out = String::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skip = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| excluded.contains(&e.name()))
        });
        if !skip {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push('\n');
            }
        }
    }
    out
}

/// Article title from metadata: `og:title`, then `<title>`, then first `<h1>`.
pub(crate) fn extract_title(document: &Html) -> Option<String> {
    let og = Selector::parse(r#"meta[property="og:title"]"#).unwrap();
    if let Some(element) = document.select(&og).next() {
        if let Some(content) = element.value().attr("content") {
            let title = content.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }

    for selector_str in ["title", "h1"] {
        let selector = Selector::parse(selector_str).unwrap();
        if let Some(element) = document.select(&selector).next() {
            let title = squash_whitespace(&element.text().collect::<String>());
            if !title.is_empty() {
                return Some(title);
            }
        }
    }

    None
}

/// Collect `img` references from a parsed document.
///
/// Scans `img` plus any extra selectors in order, deduplicating by `src`
/// and capping at `cap` references. Lazy-loaded images that stash their
/// URL in `data-src` are picked up too.
pub(crate) fn scan_document_images(
    document: &Html,
    extra_selectors: &[&str],
    cap: usize,
) -> Vec<RawImageRef> {
    let mut refs: Vec<RawImageRef> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut position = 0usize;

    let mut selectors: Vec<&str> = vec!["img"];
    selectors.extend_from_slice(extra_selectors);

    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            if refs.len() >= cap {
                return refs;
            }
            let src = element
                .value()
                .attr("src")
                .or_else(|| element.value().attr("data-src"))
                .map(str::trim)
                .unwrap_or("");
            if src.is_empty() || !seen.insert(src.to_string()) {
                continue;
            }
            let alt = element
                .value()
                .attr("alt")
                .map(|a| a.trim().to_string())
                .unwrap_or_default();
            let (container, caption) = describe_container(&element);
            refs.push(RawImageRef {
                src: src.to_string(),
                alt,
                caption,
                position,
                container,
            });
            position += 1;
        }
    }

    refs
}

/// Same scan over an unparsed HTML string.
pub(crate) fn scan_image_refs(html: &str, extra_selectors: &[&str], cap: usize) -> Vec<RawImageRef> {
    let document = Html::parse_document(html);
    scan_document_images(&document, extra_selectors, cap)
}

/// Container tag name plus a figcaption when the image sits in a figure.
fn describe_container(element: &ElementRef) -> (String, String) {
    let mut container = String::from("document");
    let mut caption = String::new();

    for ancestor in element.ancestors().take(3) {
        let Some(parent) = ElementRef::wrap(ancestor) else {
            continue;
        };
        if container == "document" {
            container = parent.value().name().to_string();
        }
        if parent.value().name() == "figure" {
            container = "figure".to_string();
            let figcaption = Selector::parse("figcaption").unwrap();
            if let Some(cap_el) = parent.select(&figcaption).next() {
                caption = squash_whitespace(&cap_el.text().collect::<String>());
            }
            break;
        }
    }

    (container, caption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_priority() {
        let html = r#"<html><head>
            <meta property="og:title" content="OG Title">
            <title>Tab Title</title>
            </head><body><h1>Heading</h1></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(extract_title(&doc), Some("OG Title".to_string()));

        let html = "<html><head><title>Tab Title</title></head><body><h1>Heading</h1></body></html>";
        let doc = Html::parse_document(html);
        assert_eq!(extract_title(&doc), Some("Tab Title".to_string()));

        let html = "<html><body><h1>Heading</h1></body></html>";
        let doc = Html::parse_document(html);
        assert_eq!(extract_title(&doc), Some("Heading".to_string()));
    }

    #[test]
    fn test_body_text_excludes_chrome() {
        let html = r#"<html><body>
            <nav>Menu items</nav>
            <p>Real content here</p>
            <script>var x = 1;</script>
            <footer>Copyright</footer>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let text = body_text(&doc, &["script", "nav", "footer"]);
        assert!(text.contains("Real content here"));
        assert!(!text.contains("Menu items"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_scan_images_dedup_and_cap() {
        let mut html = String::from("<html><body>");
        html.push_str(r#"<img src="/a.png" alt="first">"#);
        html.push_str(r#"<img src="/a.png" alt="duplicate">"#);
        for i in 0..15 {
            html.push_str(&format!(r#"<img src="/extra-{}.png">"#, i));
        }
        html.push_str("</body></html>");

        let refs = scan_image_refs(&html, &[], MAX_IMAGE_REFS);
        assert_eq!(refs.len(), MAX_IMAGE_REFS);
        assert_eq!(refs[0].src, "/a.png");
        assert_eq!(refs[0].alt, "first");
        assert_eq!(refs[1].src, "/extra-0.png");
    }

    #[test]
    fn test_scan_images_figure_caption() {
        let html = r#"<html><body>
            <figure>
              <img src="/chart.png" alt="chart">
              <figcaption>Quarterly results</figcaption>
            </figure>
            <div><img src="/plain.png"></div>
        </body></html>"#;
        let refs = scan_image_refs(html, &[], MAX_IMAGE_REFS);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].container, "figure");
        assert_eq!(refs[0].caption, "Quarterly results");
        assert_eq!(refs[1].container, "div");
        assert!(refs[1].caption.is_empty());
    }

    #[test]
    fn test_scan_images_data_src_fallback() {
        let html = r#"<html><body><img data-src="/lazy.png" alt="lazy"></body></html>"#;
        let refs = scan_image_refs(html, &[], MAX_IMAGE_REFS);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].src, "/lazy.png");
    }
}
