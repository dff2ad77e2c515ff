//! Catalog-Watch main entry point
//!
//! This is the command-line interface for the Catalog-Watch change-tracking crawler.

use anyhow::Context;
use catalog_watch::config::{load_config_with_hash, validate, Config};
use catalog_watch::crawler::run_crawl;
use catalog_watch::output::{
    build_daily_report, load_statistics, print_changes, print_crawl_summary, print_statistics,
    recent_changes, write_daily_report,
};
use catalog_watch::storage::SqliteStorage;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Watch: a change-tracking catalog crawler
///
/// Catalog-Watch walks the category listings of a paginated catalog, stores a
/// structured record per item and logs every new or changed item.
#[derive(Parser, Debug)]
#[command(name = "catalog-watch")]
#[command(version)]
#[command(about = "A change-tracking catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget the resume marker and crawl every category
    #[arg(long)]
    fresh: bool,

    /// Override the maximum number of concurrent fetches
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "changes", "export_report"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "changes", "export_report"])]
    stats: bool,

    /// Show changes detected in the last HOURS hours and exit
    #[arg(long, value_name = "HOURS", conflicts_with_all = ["dry_run", "stats", "export_report"])]
    changes: Option<u32>,

    /// Write today's JSON change report and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "changes"])]
    export_report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
        validate(&config).context("Invalid --concurrency value")?;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(hours) = cli.changes {
        handle_changes(&config, hours)?;
    } else if cli.export_report {
        handle_export_report(&config)?;
    } else {
        handle_crawl(&config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_watch=info,warn"),
            1 => EnvFilter::new("catalog_watch=debug,info"),
            2 => EnvFilter::new("catalog_watch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let config = Config::default();
            validate(&config).context("Default configuration is invalid")?;
            Ok(config)
        }
    }
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    SqliteStorage::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Watch Dry Run ===\n");

    println!("Catalog:");
    println!("  Base URL: {}", config.catalog.base_url);

    println!("\nCrawler Configuration:");
    println!("  Max concurrent fetches: {}", config.crawler.concurrency);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms doubling, capped at {}ms",
        config.retry.backoff_base_ms, config.retry.backoff_cap_ms
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Resume marker: {}", config.output.resume_path);
    println!("  Reports: {}", config.output.report_dir);

    println!("\n✓ Configuration is valid");
    if config.catalog.categories.is_empty() {
        println!("✓ Would discover categories from {}", config.catalog.base_url);
    } else {
        println!(
            "✓ Would crawl {} configured categories:",
            config.catalog.categories.len()
        );
        for category in &config.catalog.categories {
            println!("    * {}", category);
        }
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --changes mode: prints the recent-changes feed
fn handle_changes(config: &Config, hours: u32) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let entries =
        recent_changes(&storage, hours, Utc::now()).context("Failed to load change log")?;
    print_changes(&entries, hours);

    Ok(())
}

/// Handles the --export-report mode: writes today's change report
fn handle_export_report(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let report = build_daily_report(&storage, Utc::now()).context("Failed to build report")?;
    let path = write_daily_report(&report, Path::new(&config.output.report_dir))
        .context("Failed to write report")?;

    println!("✓ Report with {} changes exported to: {}", report.total_changes, path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring resume marker)");
    } else {
        tracing::info!("Starting crawl (will resume after the last completed category)");
    }

    tokio::select! {
        result = run_crawl(config, fresh) => {
            let summary = result.context("Crawl failed")?;
            print_crawl_summary(&summary);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            // The interrupted category was not marked complete and is redone next run
            tracing::warn!("Interrupted, stopping crawl");
            Ok(())
        }
    }
}
