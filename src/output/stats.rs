//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! item and change-log statistics from the storage layer.

use crate::changes::ChangeKind;
use crate::storage::{Storage, StorageResult};
use serde::Serialize;

/// Store statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatistics {
    /// Number of distinct items stored
    pub total_items: u64,

    /// Change entries recording a first sighting
    pub new_changes: u64,

    /// Change entries recording a content change
    pub updated_changes: u64,
}

impl StoreStatistics {
    pub fn total_changes(&self) -> u64 {
        self.new_changes + self.updated_changes
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_items: storage.count_items()?,
        new_changes: storage.count_changes(ChangeKind::New)?,
        updated_changes: storage.count_changes(ChangeKind::Updated)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Items:");
    println!("  Total items tracked: {}", stats.total_items);
    println!();

    println!("Change Log:");
    println!("  New: {}", stats.new_changes);
    println!("  Updated: {}", stats.updated_changes);
    println!("  Total: {}", stats.total_changes());

    let churn = if stats.total_items > 0 {
        (stats.updated_changes as f64 / stats.total_items as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!("Update rate: {:.1} updates per 100 items", churn);
}
