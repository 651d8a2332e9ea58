//! `discover` command: scrape the index table into the discovery queue.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::discovery::{DiscoveryResult, DiscoveryService};
use crate::repository::DbContext;
use crate::scrapers::BrowserFetcher;

/// Run the discovery phase against the configured index page.
pub(super) async fn run_discovery(
    settings: &Settings,
    ctx: &DbContext,
    browser: Arc<Mutex<BrowserFetcher>>,
    index_url: Option<&str>,
    load_more: bool,
) -> anyhow::Result<DiscoveryResult> {
    let index_url = index_url.unwrap_or(&settings.index_url);
    let service = DiscoveryService::new(browser, ctx.discovery());
    service.run(index_url, load_more).await
}

pub async fn cmd_discover(
    settings: &Settings,
    load_more: bool,
    index_url: Option<&str>,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!(
        "Discovering articles from {}...",
        index_url.unwrap_or(&settings.index_url)
    ));

    let browser = Arc::new(Mutex::new(BrowserFetcher::new(settings.browser.clone())));
    let result = run_discovery(settings, &ctx, browser.clone(), index_url, load_more).await;
    browser.lock().await.close().await;
    pb.finish_and_clear();
    let result = result?;

    println!(
        "{} Found {} rows, {} new",
        style("✓").green(),
        result.rows_found,
        result.rows_inserted
    );
    if result.load_more_clicks > 0 {
        println!(
            "  {} expanded the table {} times",
            style("→").dim(),
            result.load_more_clicks
        );
    }

    let queued = ctx.discovery().count().await?;
    println!("  {} {} URLs queued", style("→").dim(), queued);

    Ok(())
}
