//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests returning the page body
//! - Retry logic for transient failures
//! - Error classification (not-found vs. other status vs. network)
//! - A global bound on fetches in flight

use crate::config::CrawlerConfig;
use crate::crawler::retry::{RetryFailure, RetryPolicy};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Failure of a single document fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status. Never retried.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Failure that a retry would not fix (bad URL, undecodable body, ...)
    #[error("Request failed for {url}: {message}")]
    Request { url: String, message: String },

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Fetch of {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// True for the 404 that marks the end of a category's pages
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }

    /// True for network-level failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
    }

    fn from_reqwest(url: &str, e: &reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            Self::Timeout { url }
        } else if e.is_connect() || e.is_request() || e.is_body() {
            Self::Network {
                url,
                message: e.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// Anything that can turn a URL into an HTML document
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl<S: DocumentSource> DocumentSource for Arc<S> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.as_ref().fetch(url).await
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_watch::config::CrawlerConfig;
/// use catalog_watch::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.fetch_timeout())
        .connect_timeout(config.fetch_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP fetcher with retry on transient failures
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 404 | Immediate → not found (end of pagination) |
/// | Other HTTP 4xx/5xx | Immediate → status error |
/// | Timeout | Retry with backoff |
/// | Connection / body error | Retry with backoff |
/// | Anything else | Immediate → request error |
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Builds a fetcher straight from configuration
    pub fn from_config(
        crawler: &CrawlerConfig,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(crawler)?, policy))
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }
}

impl DocumentSource for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let result = self
            .policy
            .run(
                |attempt| {
                    tracing::trace!("GET {} (attempt {})", url, attempt);
                    self.fetch_once(url)
                },
                FetchError::is_transient,
            )
            .await;

        result.map_err(|failure| match failure {
            RetryFailure::Permanent(e) => e,
            RetryFailure::Exhausted { attempts, last } => {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, last);
                FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts,
                    last: last.to_string(),
                }
            }
        })
    }
}

/// Caps the number of fetches in flight through one shared semaphore
///
/// Every clone shares the same permits, so the cap holds across all
/// categories and tasks of a run.
pub struct ConcurrencyLimit<S> {
    inner: S,
    permits: Arc<Semaphore>,
}

impl<S> ConcurrencyLimit<S> {
    pub fn new(inner: S, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

impl<S: DocumentSource> DocumentSource for ConcurrencyLimit<S> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Cancelled {
                url: url.to_string(),
            })?;
        self.inner.fetch(url).await
    }
}
