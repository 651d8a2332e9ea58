//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules.

mod crawl;
mod db;
mod discover;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "blogh")]
#[command(about = "Engineering blog harvesting and archival system")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing blogharvest.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Discover article URLs and harvest them through the extraction cascade
    Crawl {
        /// Cap on URLs processed this run (-1 = unlimited)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        max_blogs: i64,
        /// Re-extract URLs the catalog already marks as done
        #[arg(long)]
        force_reextract: bool,
        /// Click the index page's load-more control before scraping rows
        #[arg(long)]
        load_more: bool,
        /// Only re-run URLs whose catalog entry is failed or low quality
        #[arg(long)]
        test_problematic: bool,
        /// Discovery index page URL (overrides config)
        #[arg(long)]
        index_url: Option<String>,
        /// Number of harvest workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Discover article URLs from the index page (does not harvest)
    Discover {
        /// Click the index page's load-more control before scraping rows
        #[arg(long)]
        load_more: bool,
        /// Discovery index page URL (overrides config)
        #[arg(long)]
        index_url: Option<String>,
    },

    /// Show catalog status
    Status,

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate {
        /// Only list registered migrations, don't run them
        #[arg(long)]
        check: bool,
    },
    /// Show table row counts
    Stats,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        target: cli.target,
    };
    let settings = load_settings_with_options(options).await;

    match cli.command {
        Commands::Crawl {
            max_blogs,
            force_reextract,
            load_more,
            test_problematic,
            index_url,
            workers,
        } => {
            crawl::cmd_crawl(
                &settings,
                max_blogs,
                force_reextract,
                load_more,
                test_problematic,
                index_url.as_deref(),
                workers,
            )
            .await
        }
        Commands::Discover {
            load_more,
            index_url,
        } => discover::cmd_discover(&settings, load_more, index_url.as_deref()).await,
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Db { command } => match command {
            DbCommands::Migrate { check } => db::cmd_migrate(&settings, check).await,
            DbCommands::Stats => db::cmd_stats(&settings).await,
        },
    }
}
