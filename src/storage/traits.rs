//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::changes::{ChangeEntry, ChangeKind};
use crate::storage::{ItemQuery, ItemRecord, StoredItem};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage handle poisoned by a panicked task")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Items are keyed by their source URL; every write is an upsert on that key.
/// Change entries are append-only.
pub trait Storage {
    // ===== Items =====

    /// Looks up the stored copy of an item by its URL
    fn find_by_key(&self, url: &str) -> StorageResult<Option<StoredItem>>;

    /// Inserts or overwrites an item together with its fingerprint
    fn upsert_item(&mut self, item: &ItemRecord, fingerprint: &str) -> StorageResult<()>;

    /// Upserts an item and, when given, appends its change entry atomically
    fn record_item(
        &mut self,
        item: &ItemRecord,
        fingerprint: &str,
        change: Option<&ChangeEntry>,
    ) -> StorageResult<()>;

    /// Lists stored items matching a filter
    fn query_items(&self, query: &ItemQuery) -> StorageResult<Vec<ItemRecord>>;

    /// Gets total item count
    fn count_items(&self) -> StorageResult<u64>;

    // ===== Change Log =====

    /// Appends a change entry and returns its row ID
    fn append_change(&mut self, entry: &ChangeEntry) -> StorageResult<i64>;

    /// Lists change entries detected at or after `since`, most recent first
    fn list_changes_since(
        &self,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<ChangeEntry>>;

    /// Counts change entries of one kind
    fn count_changes(&self, kind: ChangeKind) -> StorageResult<u64>;
}
