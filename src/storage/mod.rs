//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Item records, upserted by their source URL
//! - The append-only change log
//! - Read-side item queries used by reporting and the external query API

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store handle shared by every concurrent crawl task
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Opens the SQLite store at `path` and wraps it in a shareable handle
pub fn open_shared(path: &Path) -> StorageResult<SharedStorage> {
    let storage = SqliteStorage::new(path)?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Locks a shared store handle
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Status tag written with every successfully extracted item
pub const STATUS_SUCCESS: &str = "success";

/// One crawled catalog item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    /// Source URL, the natural key
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub price_excl_tax: f64,
    pub price_incl_tax: f64,
    pub availability_raw: String,
    pub availability_count: u32,
    pub num_reviews: u32,
    pub image_url: String,
    /// 1..=5, or 0 when unknown
    pub rating: u8,
    #[serde(skip_serializing)]
    pub raw_html: String,
    pub crawled_at: DateTime<Utc>,
    pub status: String,
}

/// An item as read back from the store
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub id: i64,
    pub record: ItemRecord,
    pub fingerprint: String,
}

/// Fields the item listing can be sorted by (always descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Rating,
    Price,
    Reviews,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::Price => "price_incl_tax",
            Self::Reviews => "num_reviews",
        }
    }
}

impl FromStr for SortField {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating" => Ok(Self::Rating),
            "price" => Ok(Self::Price),
            "reviews" => Ok(Self::Reviews),
            other => Err(StorageError::InvalidQuery(format!(
                "invalid sort field '{}', expected rating, price or reviews",
                other
            ))),
        }
    }
}

/// Filter, sort and paging options for listing stored items
#[derive(Debug, Clone)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Exact rating, 1..=5
    pub rating: Option<u8>,
    pub sort_by: SortField,
    /// 1-based page number
    pub page: u32,
    /// Page size, 1..=100
    pub size: u32,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            category: None,
            min_price: None,
            max_price: None,
            rating: None,
            sort_by: SortField::default(),
            page: 1,
            size: 20,
        }
    }
}

impl ItemQuery {
    pub fn validate(&self) -> StorageResult<()> {
        if self.page < 1 {
            return Err(StorageError::InvalidQuery("page must be >= 1".to_string()));
        }
        if !(1..=100).contains(&self.size) {
            return Err(StorageError::InvalidQuery(format!(
                "size must be between 1 and 100, got {}",
                self.size
            )));
        }
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(StorageError::InvalidQuery(format!(
                    "rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

/// Formats a timestamp with a fixed width so stored values sort chronologically
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}
