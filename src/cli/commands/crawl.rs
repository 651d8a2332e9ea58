//! `crawl` command: discovery plus the full harvest cascade.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use tokio::sync::{mpsc, Mutex};

use crate::config::Settings;
use crate::extract::ExtractionPipeline;
use crate::scrapers::{BrowserFetcher, HttpClient};
use crate::services::{HarvestConfig, HarvestEvent, HarvestService};

pub async fn cmd_crawl(
    settings: &Settings,
    max_blogs: i64,
    force_reextract: bool,
    load_more: bool,
    test_problematic: bool,
    index_url: Option<&str>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let browser = Arc::new(Mutex::new(BrowserFetcher::new(settings.browser.clone())));

    // Problematic mode re-runs catalog entries; the index page adds nothing.
    if !test_problematic {
        println!(
            "{} Discovering articles from {}",
            style("→").cyan(),
            index_url.unwrap_or(&settings.index_url)
        );
        let discovery =
            super::discover::run_discovery(settings, &ctx, browser.clone(), index_url, load_more)
                .await;
        match discovery {
            Ok(result) => println!(
                "{} Found {} rows, {} new",
                style("✓").green(),
                result.rows_found,
                result.rows_inserted
            ),
            Err(e) => println!(
                "{} Discovery failed ({}), harvesting the existing queue",
                style("!").yellow(),
                e
            ),
        }
    }

    let workers = workers.unwrap_or(settings.workers).max(1);
    println!("{} Starting {} harvest workers", style("→").cyan(), workers);

    let client = HttpClient::new(
        &settings.user_agent,
        Duration::from_secs(settings.request_timeout),
        Duration::from_millis(settings.request_delay_ms),
    );
    let pipeline = Arc::new(ExtractionPipeline::new(client, Some(browser.clone())));

    let service = HarvestService::new(
        ctx.discovery(),
        ctx.catalog(),
        ctx.pdfs(),
        pipeline,
        HarvestConfig {
            storage_dir: settings.storage_dir.clone(),
            user_agent: settings.user_agent.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            max_blogs,
            force_reextract,
            test_problematic,
            workers,
        },
    );

    let (event_tx, mut event_rx) = mpsc::channel::<HarvestEvent>(100);

    // Event handler renders progress (UI layer)
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                HarvestEvent::Started { title, url, .. } => {
                    println!("  {} {} ({})", style("→").cyan(), title, url);
                }
                HarvestEvent::Extracted {
                    url,
                    method,
                    tier,
                    content_length,
                    image_count,
                    ..
                } => {
                    println!(
                        "  {} {} [{}/{}] {} chars, {} images",
                        style("✓").green(),
                        url,
                        method.as_str(),
                        tier.as_str(),
                        content_length,
                        image_count
                    );
                }
                HarvestEvent::Skipped { url, reason } => {
                    println!("  {} {} ({})", style("→").dim(), url, reason);
                }
                HarvestEvent::PdfSaved { url, bytes, .. } => {
                    println!("  {} {} (pdf, {} bytes)", style("✓").green(), url, bytes);
                }
                HarvestEvent::Failed { url, error, .. } => {
                    println!("  {} {}: {}", style("✗").red(), url, error);
                }
            }
        }
    });

    let result = service.run(event_tx).await;
    let _ = event_handler.await;
    browser.lock().await.close().await;
    let result = result?;

    println!(
        "\n{} Harvested {} articles",
        style("✓").green(),
        result.harvested
    );
    if result.pdfs > 0 {
        println!("  {} {} PDFs saved", style("→").dim(), result.pdfs);
    }
    if result.skipped > 0 {
        println!("  {} {} already done", style("→").dim(), result.skipped);
    }
    if result.failed > 0 {
        println!("  {} {} failed", style("!").yellow(), result.failed);
    }

    Ok(())
}
