//! `db` commands: migrations and table stats.

use std::path::PathBuf;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::migrations;

/// Resolve the on-disk SQLite path, honoring an explicit database URL.
fn sqlite_path(settings: &Settings) -> PathBuf {
    match settings.database_url {
        Some(ref url) => PathBuf::from(url.strip_prefix("sqlite:").unwrap_or(url)),
        None => settings.database_path(),
    }
}

pub async fn cmd_migrate(settings: &Settings, check: bool) -> anyhow::Result<()> {
    println!("{} Database migration", style("→").cyan());
    println!("  Database: {}", settings.database_url());

    let registry = migrations::registry();
    let ordered = registry
        .resolve_order()
        .map_err(|e| anyhow::anyhow!("Failed to resolve migration order: {}", e))?;

    if check {
        println!("  {} migrations registered:", ordered.len());
        for name in &ordered {
            println!("    {}", name);
        }
        return Ok(());
    }

    settings.ensure_directories()?;

    // cetane generates plain SQL per backend; apply it over rusqlite.
    let db_path = sqlite_path(settings);
    let conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let backend = cetane::backend::Sqlite;

    for name in ordered {
        let migration = registry
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Migration {} missing after resolve", name))?;
        for stmt in migration.forward_sql(&backend) {
            if stmt.trim().is_empty() {
                continue;
            }
            conn.execute_batch(&stmt)
                .with_context(|| format!("Migration {} failed", name))?;
        }
        println!("  {} {}", style("✓").green(), name);
    }

    println!("{} Migration complete", style("✓").green());
    Ok(())
}

pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    if !settings.database_exists() {
        println!(
            "{} No database at {}",
            style("!").yellow(),
            settings.database_path().display()
        );
        return Ok(());
    }

    let ctx = settings.create_db_context();
    let tables = ctx.list_tables().await?;

    println!("{}", style("Tables").bold());
    for table in &tables {
        match table.as_str() {
            "data" => println!("  {:>8} {}", ctx.discovery().count().await?, table),
            "blog_content" => println!("  {:>8} {}", ctx.catalog().count().await?, table),
            "pdf_files" => println!("  {:>8} {}", ctx.pdfs().count().await?, table),
            _ => println!("  {:>8} {}", "-", table),
        }
    }
    Ok(())
}
