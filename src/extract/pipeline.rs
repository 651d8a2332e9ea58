//! Cascade driver: strategies, quality gate, image passes.
//!
//! One call to [`ExtractionPipeline::extract`] runs the whole per-article
//! flow: fetch the raw document once, try each strategy in order until one
//! passes the usability gate, then download the images every attempt found
//! plus whatever the supplemental scan turns up. Persistence of the catalog
//! row and text file stays with the caller.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{
    ArticleRequest, ExtractionAttempt, ExtractionMethod, ExtractionResult, ImageRecord,
    QualityTier, USABLE_TEXT_LEN,
};
use crate::scrapers::{BrowserFetcher, HttpClient, RenderedPage};

use super::images::ImageResolver;
use super::rendered::IMAGE_SELECTORS;
use super::{
    default_strategies, scan_image_refs, ExtractionStrategy, RawImageRef, SelectorTry,
    StrategyOutcome, StrategySource, MAX_IMAGE_REFS,
};

/// Everything one extraction produced, for persistence and diagnostics.
#[derive(Debug)]
pub struct PipelineOutput {
    pub result: ExtractionResult,
    /// One entry per strategy invocation, in cascade order.
    pub attempts: Vec<ExtractionAttempt>,
    /// Selector probes accumulated across all strategies.
    pub selector_tries: Vec<SelectorTry>,
    /// Selector that produced the winning text, when one did.
    pub winning_selector: Option<String>,
    /// Image references the supplemental scan found (before dedup).
    pub supplemental_found: usize,
    /// Fetch, render, and download failures outside any one strategy.
    pub errors: Vec<String>,
}

/// Quality tier earned by the strategy that passed the gate.
fn tier_for(method: ExtractionMethod) -> QualityTier {
    match method {
        ExtractionMethod::Structured => QualityTier::High,
        ExtractionMethod::Readable => QualityTier::Medium,
        ExtractionMethod::Rendered => QualityTier::Low,
        ExtractionMethod::None => QualityTier::Failed,
    }
}

pub struct ExtractionPipeline {
    client: HttpClient,
    browser: Option<Arc<Mutex<BrowserFetcher>>>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionPipeline {
    pub fn new(client: HttpClient, browser: Option<Arc<Mutex<BrowserFetcher>>>) -> Self {
        Self::with_strategies(client, browser, default_strategies())
    }

    /// Cascade over a custom strategy list, tried in the given order.
    pub fn with_strategies(
        client: HttpClient,
        browser: Option<Arc<Mutex<BrowserFetcher>>>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
    ) -> Self {
        Self {
            client,
            browser,
            strategies,
        }
    }

    /// Run the full extraction flow for one article.
    ///
    /// Never fails: total strategy failure yields the sentinel result, and
    /// every lower-level error lands in the output's diagnostics instead.
    pub async fn extract(&self, request: &ArticleRequest, images_dir: &Path) -> PipelineOutput {
        let url = request.url.as_str();
        let mut errors: Vec<String> = Vec::new();
        let mut attempts: Vec<ExtractionAttempt> = Vec::new();
        let mut selector_tries: Vec<SelectorTry> = Vec::new();
        let mut winning_selector: Option<String> = None;
        let mut harvested: Vec<RawImageRef> = Vec::new();

        // One plain fetch shared by the raw-HTML strategies.
        let raw_html = match self.client.get_text(url).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                errors.push(format!("fetch failed: {}", e));
                None
            }
        };

        let mut page: Option<RenderedPage> = None;
        let mut rendered_html: Option<String> = None;
        let mut winner: Option<(StrategyOutcome, ExtractionMethod)> = None;

        for strategy in &self.strategies {
            if strategy.needs_rendered_document() && rendered_html.is_none() {
                match self.render(url).await {
                    Ok((opened, html)) => {
                        page = Some(opened);
                        rendered_html = Some(html);
                    }
                    Err(e) => errors.push(format!("browser render failed: {}", e)),
                }
            }

            let source = StrategySource {
                url,
                raw_html: raw_html.as_deref(),
                rendered_html: rendered_html.as_deref(),
            };
            let mut outcome = strategy.attempt(&source).await;
            let method = strategy.method();
            let text_len = outcome.text.chars().count();
            let passed = text_len >= USABLE_TEXT_LEN;

            attempts.push(ExtractionAttempt {
                strategy: method.as_str().to_string(),
                succeeded: passed,
                text_length: text_len,
                image_ref_count: outcome.image_refs.len(),
                errors: outcome.errors.clone(),
            });
            selector_tries.append(&mut outcome.selector_tries);
            // Sub-threshold text is discarded, but its images are still
            // worth downloading if a later strategy wins.
            harvested.append(&mut outcome.image_refs);

            if passed {
                debug!("{} accepted {} ({} chars)", method.as_str(), url, text_len);
                winning_selector = outcome.winning_selector.take();
                winner = Some((outcome, method));
                break;
            }
            debug!("{} fell through for {} ({} chars)", method.as_str(), url, text_len);
        }

        // Supplemental scan over the best document we have. Runs on every
        // outcome for diagnostics; downloads happen only for accepted ones.
        let scan_html = rendered_html.as_deref().or(raw_html.as_deref());
        let supplemental: Vec<RawImageRef> = scan_html
            .map(|html| scan_image_refs(html, IMAGE_SELECTORS, MAX_IMAGE_REFS))
            .unwrap_or_default();
        let supplemental_found = supplemental.len();

        if let Some(opened) = page.take() {
            opened.close().await;
        }

        let result = match winner {
            Some((outcome, method)) => {
                let mut records: Vec<ImageRecord> = Vec::new();
                let resolver = ImageResolver::new(&self.client);
                errors.extend(
                    resolver
                        .download_into(url, &harvested, images_dir, &mut records)
                        .await,
                );
                errors.extend(
                    resolver
                        .download_into(url, &supplemental, images_dir, &mut records)
                        .await,
                );

                let title = outcome
                    .title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| request.title.clone());
                ExtractionResult {
                    text: outcome.text,
                    title,
                    images: records,
                    method,
                    tier: tier_for(method),
                }
            }
            None => {
                info!("All extraction strategies failed for {}", url);
                ExtractionResult::sentinel()
            }
        };

        PipelineOutput {
            result,
            attempts,
            selector_tries,
            winning_selector,
            supplemental_found,
            errors,
        }
    }

    /// Open the URL in the shared browser and serialize its DOM.
    /// The fetcher lock is held only for the open, not the settle wait.
    async fn render(&self, url: &str) -> anyhow::Result<(RenderedPage, String)> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser unavailable"))?;
        let opened = {
            let mut fetcher = browser.lock().await;
            fetcher.open(url).await?
        };
        opened.settle().await;
        match opened.html().await {
            Ok(html) => Ok((opened, html)),
            Err(e) => {
                opened.close().await;
                Err(e)
            }
        }
    }
}
