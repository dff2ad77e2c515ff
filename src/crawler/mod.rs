//! Crawler module for catalog traversal and item processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and a global concurrency bound
//! - Category listing pagination
//! - Item page extraction
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod retry;
mod walker;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{run_crawl, Coordinator, CrawlSummary};
pub use extractor::{
    parse_availability_count, parse_price, Extractor, RatingInput, DEFAULT_AVAILABILITY,
    DEFAULT_CATEGORY, DEFAULT_TITLE,
};
pub use fetcher::{build_http_client, ConcurrencyLimit, DocumentSource, FetchError, Fetcher};
pub use retry::{RetryFailure, RetryPolicy};
pub use walker::{page_url, CategoryPages, CategoryWalker};
