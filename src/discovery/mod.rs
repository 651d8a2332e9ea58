//! Index-page discovery: load-more expansion and table row scraping.
//!
//! The article index renders its table client-side and hides most rows
//! behind a "Load more" control, so discovery runs through the browser:
//! open the index, click the control until the table stops growing (or a
//! hard cap is hit), then scrape `(company, title, tags, year, url)` rows
//! out of the serialized DOM and insert them keyed by URL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::ArticleRequest;
use crate::repository::DiscoveryRepository;
use crate::scrapers::{BrowserFetcher, RenderedPage};
use crate::utils::squash_whitespace;

/// Hard cap on "Load more" clicks; guarantees the expansion loop ends.
pub const MAX_LOAD_MORE_CLICKS: usize = 20;

/// Wait after the initial navigation before touching the table.
const PAGE_LOAD_WAIT: Duration = Duration::from_millis(2000);

/// Wait after each click for the next batch of rows to render.
const CONTENT_LOAD_WAIT: Duration = Duration::from_millis(1000);

/// Cells of the index table, one per column per row.
const CELL_SELECTOR: &str = "div[data-row-index]";

/// Finds and clicks the load-more control, trying progressively looser
/// selectors. Resolves true when something was clicked.
const CLICK_LOAD_MORE_SCRIPT: &str = r#"
(() => {
    const selectors = ['div[role="button"]', 'button', '[role="button"]'];
    for (const selector of selectors) {
        const candidates = Array.from(document.querySelectorAll(selector));
        const target = candidates.find(
            (el) => el.textContent.trim().toLowerCase().includes('load more')
        );
        if (target) {
            target.scrollIntoView({ block: 'center' });
            target.click();
            return true;
        }
    }
    return false;
})()
"#;

const CELL_COUNT_SCRIPT: &str =
    "document.querySelectorAll('div[data-row-index]').length";

/// What one discovery run produced.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub rows_found: usize,
    pub rows_inserted: usize,
    pub load_more_clicks: usize,
}

pub struct DiscoveryService {
    browser: Arc<Mutex<BrowserFetcher>>,
    repo: DiscoveryRepository,
}

impl DiscoveryService {
    pub fn new(browser: Arc<Mutex<BrowserFetcher>>, repo: DiscoveryRepository) -> Self {
        Self { browser, repo }
    }

    /// Scrape the index table into the `data` table.
    ///
    /// Repeat runs are safe: inserts are ignore-on-duplicate by URL.
    pub async fn run(&self, index_url: &str, load_more: bool) -> Result<DiscoveryResult> {
        info!("Discovering articles from {}", index_url);

        let page = {
            let mut fetcher = self.browser.lock().await;
            fetcher.open(index_url).await?
        };
        page.settle().await;
        tokio::time::sleep(PAGE_LOAD_WAIT).await;

        let mut result = DiscoveryResult::default();
        if load_more {
            result.load_more_clicks = self.expand_table(&page).await;
        }

        if !page.wait_for_selector(CELL_SELECTOR).await {
            page.close().await;
            anyhow::bail!("no table rows found on {}", index_url);
        }

        let html = match page.html().await {
            Ok(html) => {
                page.close().await;
                html
            }
            Err(e) => {
                page.close().await;
                return Err(e);
            }
        };

        let rows = parse_rows(&html);
        result.rows_found = rows.len();
        info!("Scraped {} rows from index table", rows.len());

        for row in &rows {
            if self.repo.insert(row).await? {
                result.rows_inserted += 1;
            }
        }
        info!(
            "Inserted {} new rows ({} already known)",
            result.rows_inserted,
            result.rows_found - result.rows_inserted
        );

        Ok(result)
    }

    /// Click the load-more control until the table stops growing.
    async fn expand_table(&self, page: &RenderedPage) -> usize {
        let mut clicks = 0usize;
        let mut previous_cells = page.run_i64(CELL_COUNT_SCRIPT).await.unwrap_or(0);

        while clicks < MAX_LOAD_MORE_CLICKS {
            let clicked = match page.run_bool(CLICK_LOAD_MORE_SCRIPT).await {
                Ok(clicked) => clicked,
                Err(e) => {
                    warn!("Load-more click script failed: {}", e);
                    break;
                }
            };
            if !clicked {
                info!("No load-more control found after {} clicks", clicks);
                break;
            }
            clicks += 1;
            tokio::time::sleep(CONTENT_LOAD_WAIT).await;

            let cells = page.run_i64(CELL_COUNT_SCRIPT).await.unwrap_or(previous_cells);
            let new_cells = cells - previous_cells;
            debug!("Click #{}: {} table cells (+{} new)", clicks, cells, new_cells);
            if new_cells == 0 && clicks > 1 {
                info!("Table stopped growing after {} clicks", clicks);
                break;
            }
            previous_cells = cells;
        }

        if clicks >= MAX_LOAD_MORE_CLICKS {
            warn!("Reached load-more click limit ({})", MAX_LOAD_MORE_CLICKS);
        }
        clicks
    }
}

/// Scrape `(company, title, tags, year, url)` rows out of the table DOM.
///
/// Cells are grouped by their `data-row-index` attribute; a valid row has
/// at least five cells in column order. Tag spans are joined with commas so
/// they round-trip through the catalog's tag column.
fn parse_rows(html: &str) -> Vec<ArticleRequest> {
    let document = Html::parse_document(html);
    let cell_sel = Selector::parse(CELL_SELECTOR).unwrap();

    let mut by_row: BTreeMap<i64, Vec<ElementRef>> = BTreeMap::new();
    for cell in document.select(&cell_sel) {
        let Some(index) = cell
            .value()
            .attr("data-row-index")
            .and_then(|v| v.parse::<i64>().ok())
        else {
            continue;
        };
        by_row.entry(index).or_default().push(cell);
    }

    let span_sel = Selector::parse("span").unwrap();
    let link_sel = Selector::parse("a").unwrap();
    let mut rows = Vec::new();

    for (index, cells) in by_row {
        if cells.len() < 5 {
            warn!("Row {} has only {} cells, skipping", index, cells.len());
            continue;
        }

        let cell_text = |i: usize| squash_whitespace(&cells[i].text().collect::<String>());
        let company = cell_text(0);
        let title = cell_text(1);
        let tags: Vec<String> = cells[2]
            .select(&span_sel)
            .map(|span| squash_whitespace(&span.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        let year = cell_text(3);
        let url = cells[4]
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("")
            .to_string();

        if url.is_empty() {
            warn!("Row {} ({}) has no link, skipping", index, title);
            continue;
        }

        rows.push(ArticleRequest::new(url, title, company, tags, year));
    }

    rows
}
