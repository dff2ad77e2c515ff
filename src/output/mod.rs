//! Output module for crawl results and change reporting
//!
//! This module handles:
//! - Printing the end-of-run crawl summary
//! - Store statistics
//! - The recent-changes feed
//! - Writing the daily JSON change report

pub mod report;
pub mod stats;

pub use report::{build_daily_report, write_daily_report, ChangeReport};
pub use stats::{load_statistics, print_statistics, StoreStatistics};

use crate::changes::{ChangeDetails, ChangeEntry};
use crate::crawler::CrawlSummary;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Most entries the changes feed returns
pub const CHANGES_FEED_LIMIT: usize = 100;

/// Errors that can occur while producing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Prints the counts of a finished crawl
pub fn print_crawl_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Categories:");
    println!("  Total: {}", summary.categories_total);
    println!("  Skipped (already done): {}", summary.categories_skipped);
    println!("  Completed: {}", summary.categories_completed);
    println!("  Failed: {}", summary.categories_failed);
    println!();

    println!("Items:");
    println!("  Processed: {}", summary.items_processed);
    println!("  New: {}", summary.items_new);
    println!("  Updated: {}", summary.items_updated);
    println!("  Unchanged: {}", summary.items_unchanged);
    println!("  Failed: {}", summary.items_failed);
}

/// Change entries detected in the last `hours` hours, most recent first
///
/// At most [`CHANGES_FEED_LIMIT`] entries are returned.
pub fn recent_changes(
    storage: &dyn Storage,
    hours: u32,
    now: DateTime<Utc>,
) -> StorageResult<Vec<ChangeEntry>> {
    let since = now - Duration::hours(i64::from(hours));
    storage.list_changes_since(since, Some(CHANGES_FEED_LIMIT))
}

/// Prints a changes feed, one line per entry
pub fn print_changes(entries: &[ChangeEntry], hours: u32) {
    println!("=== Changes in the last {} hours ({}) ===\n", hours, entries.len());

    for entry in entries {
        let detail = match &entry.details {
            ChangeDetails::New(summary) => summary.title.clone(),
            ChangeDetails::Updated(diff) => diff
                .iter()
                .map(|(field, d)| format!("{}: {} -> {}", field, d.old, d.new))
                .collect::<Vec<_>>()
                .join(", "),
        };
        println!(
            "  {} [{}] {} ({})",
            entry.detected_at.format("%Y-%m-%d %H:%M:%S"),
            entry.kind,
            entry.item_url,
            detail
        );
    }
}
