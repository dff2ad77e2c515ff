//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a whole crawl:
//! - Planning which categories to visit from the resume marker
//! - Walking each category's listing pages in turn
//! - Dispatching every listed item to fetch → extract → change detection
//! - Advancing the resume marker once a category is fully processed
//!
//! All fetches of a run, listing pages and items alike, share one
//! concurrency bound.

use crate::changes::{ChangeDetector, ChangeKind};
use crate::config::Config;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{ConcurrencyLimit, DocumentSource, FetchError, Fetcher};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::walker::CategoryWalker;
use crate::state::{plan_categories, FileResumeStore, ResumeStore};
use crate::storage::{open_shared, SharedStorage};
use crate::CatalogError;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Counts reported at the end of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub categories_total: usize,
    /// Categories skipped because the resume marker showed them done
    pub categories_skipped: usize,
    pub categories_completed: usize,
    /// Categories whose listing aborted on a fetch error
    pub categories_failed: usize,

    /// Items dispatched, whatever their outcome
    pub items_processed: usize,
    pub items_new: usize,
    pub items_updated: usize,
    pub items_unchanged: usize,
    pub items_failed: usize,
}

impl CrawlSummary {
    fn record(&mut self, outcome: ItemOutcome) {
        self.items_processed += 1;
        match outcome {
            ItemOutcome::New => self.items_new += 1,
            ItemOutcome::Updated => self.items_updated += 1,
            ItemOutcome::Unchanged => self.items_unchanged += 1,
            ItemOutcome::Failed => self.items_failed += 1,
        }
    }
}

/// What happened to one dispatched item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    New,
    Updated,
    Unchanged,
    Failed,
}

/// Main crawler coordinator structure
pub struct Coordinator<S> {
    source: Arc<ConcurrencyLimit<S>>,
    walker: CategoryWalker,
    extractor: Extractor,
    detector: ChangeDetector,
    resume: Arc<dyn ResumeStore>,
}

impl<S: DocumentSource + 'static> Coordinator<S> {
    /// Creates a coordinator around an explicit store handle and resume store
    ///
    /// # Arguments
    ///
    /// * `source` - Where documents come from
    /// * `concurrency` - Maximum fetches in flight across the whole run
    /// * `catalog_base` - Base URL item and image links resolve against
    /// * `storage` - Shared store handle
    /// * `resume` - Resume marker persistence
    pub fn new(
        source: S,
        concurrency: usize,
        catalog_base: &Url,
        storage: SharedStorage,
        resume: Arc<dyn ResumeStore>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            source: Arc::new(ConcurrencyLimit::new(source, concurrency)),
            walker: CategoryWalker::new(catalog_base)?,
            extractor: Extractor::new(catalog_base),
            detector: ChangeDetector::new(storage),
            resume,
        })
    }

    /// Reads the category list from the catalog home page
    pub async fn discover_categories(&self) -> Result<Vec<String>, FetchError> {
        self.walker.discover_categories(self.source.as_ref()).await
    }

    /// Crawls the given categories, resuming after the last completed one
    ///
    /// Only a failure to read or reset the resume marker aborts the run.
    /// Category and item failures are logged and counted.
    pub async fn run(&self, categories: &[String]) -> Result<CrawlSummary, CatalogError> {
        let marker = self.resume.load()?;
        let plan = plan_categories(categories, marker.as_deref());

        if plan.reset {
            tracing::info!("All categories were completed by the previous run, starting over");
            self.resume.clear()?;
        } else if plan.skipped > 0 {
            tracing::info!(
                "Resuming after {} (skipping {} categories)",
                marker.as_deref().unwrap_or_default(),
                plan.skipped
            );
        }

        let mut summary = CrawlSummary {
            categories_total: categories.len(),
            categories_skipped: plan.skipped,
            ..Default::default()
        };
        let start_time = std::time::Instant::now();

        for (idx, category) in plan.pending.iter().enumerate() {
            tracing::info!(
                "Crawling category {}/{}: {}",
                idx + 1,
                plan.pending.len(),
                category
            );

            match self.crawl_category(category, &mut summary).await {
                Ok(items) => {
                    summary.categories_completed += 1;
                    tracing::info!("Category {} complete ({} items)", category, items);
                    if let Err(e) = self.resume.save(category) {
                        tracing::warn!("Failed to save resume marker {}: {}", category, e);
                    }
                }
                Err(e) => {
                    summary.categories_failed += 1;
                    tracing::warn!(stage = "listing", "Category {} aborted: {}", category, e);
                }
            }
        }

        tracing::info!(
            "Crawl finished in {:?}: {} items ({} new, {} updated, {} unchanged, {} failed)",
            start_time.elapsed(),
            summary.items_processed,
            summary.items_new,
            summary.items_updated,
            summary.items_unchanged,
            summary.items_failed
        );

        Ok(summary)
    }

    /// Walks one category and processes every item it lists
    ///
    /// Items are dispatched as soon as their listing page is read. All of them
    /// are awaited before returning, even when a later page fails.
    async fn crawl_category(
        &self,
        category: &str,
        summary: &mut CrawlSummary,
    ) -> Result<usize, FetchError> {
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        let mut pages = self.walker.pages(self.source.as_ref(), category);

        let listing = loop {
            match pages.next_page().await {
                Ok(Some(urls)) => {
                    for url in urls {
                        if seen.insert(url.clone()) {
                            tasks.spawn(process_item(
                                Arc::clone(&self.source),
                                self.extractor.clone(),
                                self.detector.clone(),
                                url,
                            ));
                        }
                    }
                }
                Ok(None) => break Ok(seen.len()),
                Err(e) => break Err(e),
            }
        };

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::warn!(stage = "task", "Item task in {} failed: {}", category, e);
                ItemOutcome::Failed
            });
            summary.record(outcome);
        }

        listing
    }
}

/// Fetch → extract → detect for a single item
async fn process_item<S: DocumentSource>(
    source: Arc<ConcurrencyLimit<S>>,
    extractor: Extractor,
    detector: ChangeDetector,
    url: String,
) -> ItemOutcome {
    let html = match source.fetch(&url).await {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(stage = "fetch", "Item {} failed: {}", url, e);
            return ItemOutcome::Failed;
        }
    };

    let record = extractor.extract(&url, &html, Utc::now());
    let detected = tokio::task::spawn_blocking(move || detector.apply(&record)).await;

    match detected {
        Ok(Ok(Some(entry))) => {
            tracing::debug!("{} item {}", entry.kind, url);
            match entry.kind {
                ChangeKind::New => ItemOutcome::New,
                ChangeKind::Updated => ItemOutcome::Updated,
            }
        }
        Ok(Ok(None)) => {
            tracing::trace!("Unchanged item {}", url);
            ItemOutcome::Unchanged
        }
        Ok(Err(e)) => {
            tracing::warn!(stage = "store", "Item {} failed: {}", url, e);
            ItemOutcome::Failed
        }
        Err(e) => {
            tracing::warn!(stage = "store", "Item {} failed: {}", url, e);
            ItemOutcome::Failed
        }
    }
}

/// Runs a complete crawl operation from configuration
///
/// Opens the store, builds the HTTP fetcher, discovers categories when none
/// are configured, then runs the coordinator. With `fresh`, the resume marker
/// is cleared first.
///
/// # Example
///
/// ```no_run
/// use catalog_watch::config::load_config;
/// use catalog_watch::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let summary = run_crawl(&config, false).await?;
/// println!("{} new items", summary.items_new);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, fresh: bool) -> Result<CrawlSummary, CatalogError> {
    let storage = open_shared(Path::new(&config.output.database_path))?;

    let resume: Arc<dyn ResumeStore> = Arc::new(FileResumeStore::new(&config.output.resume_path));
    if fresh {
        tracing::info!("Clearing resume marker");
        resume.clear()?;
    }

    let fetcher = Fetcher::from_config(&config.crawler, RetryPolicy::from(&config.retry))?;
    let catalog_base = Url::parse(&config.catalog.base_url)?;
    let coordinator = Coordinator::new(
        fetcher,
        config.crawler.concurrency as usize,
        &catalog_base,
        storage,
        resume,
    )?;

    let categories = if config.catalog.categories.is_empty() {
        coordinator.discover_categories().await?
    } else {
        config.catalog.categories.clone()
    };

    coordinator.run(&categories).await
}
