//! Catalog-Watch: a change-tracking catalog crawler
//!
//! This crate walks the category listings of a paginated e-commerce catalog,
//! extracts a structured record for every item page, persists the records and
//! keeps an append-only audit log of new and updated items, detected by
//! comparing content fingerprints between crawls.

pub mod changes;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Watch operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Resume state error: {0}")]
    Resume(#[from] state::ResumeError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Watch operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use changes::{fingerprint, ChangeDetector, ChangeEntry, ChangeKind};
pub use config::Config;
pub use crawler::{Coordinator, CrawlSummary, Extractor, Fetcher};
pub use storage::{ItemRecord, SqliteStorage, Storage};
