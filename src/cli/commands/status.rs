//! `status` command: queue depth and catalog quality breakdown.

use console::style;

use crate::config::Settings;
use crate::models::QualityTier;

pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    if !settings.database_exists() {
        println!(
            "{} No database at {}. Run 'blogh crawl' first.",
            style("!").yellow(),
            settings.database_path().display()
        );
        return Ok(());
    }

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;

    let catalog = ctx.catalog();

    println!("\n{}", style("BlogHarvest Status").bold());
    println!("  Database: {}", settings.database_url());
    println!("  Storage:  {}", settings.storage_dir.display());

    let queued = ctx.discovery().count().await?;
    let cataloged = catalog.count().await?;
    let pdf_count = ctx.pdfs().count().await?;

    println!("\n  {} URLs discovered", queued);
    println!("  {} articles cataloged", cataloged);
    println!("  {} PDFs saved", pdf_count);

    if cataloged > 0 {
        println!("\n{}", style("Extraction quality").bold());
        for tier in [
            QualityTier::High,
            QualityTier::Medium,
            QualityTier::Low,
            QualityTier::Failed,
        ] {
            let count = catalog.count_by_quality(tier).await?;
            let label = format!("{:>6}", count);
            let styled = match tier {
                QualityTier::High => style(label).green(),
                QualityTier::Medium => style(label).cyan(),
                QualityTier::Low => style(label).yellow(),
                QualityTier::Failed => style(label).red(),
            };
            println!("  {} {}", styled, tier.as_str());
        }

        let problematic = catalog.problematic().await?.len();
        if problematic > 0 {
            println!(
                "\n{} {} entries need a retry (run 'blogh crawl --test-problematic')",
                style("!").yellow(),
                problematic
            );
        }
    }

    Ok(())
}
