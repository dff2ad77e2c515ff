//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small mock catalog and run the full
//! crawl cycle end-to-end against a SQLite database in a temp directory.

mod fixtures;

use catalog_watch::changes::{ChangeDetails, ChangeKind};
use catalog_watch::config::{CatalogConfig, Config, CrawlerConfig, OutputConfig, RetryConfig};
use catalog_watch::crawler::{
    run_crawl, Coordinator, DocumentSource, FetchError, Fetcher, RetryPolicy,
};
use catalog_watch::output::build_daily_report;
use catalog_watch::state::{FileResumeStore, ResumeStore};
use catalog_watch::storage::{open_shared, SqliteStorage, Storage};
use chrono::{TimeZone, Utc};
use fixtures::{home_page, item_page, listing_page};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRAVEL: &str = "catalogue/category/books/travel_2/index.html";
const MYSTERY: &str = "catalogue/category/books/mystery_3/index.html";

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(server: &MockServer, dir: &TempDir, categories: Vec<String>) -> Config {
    Config {
        catalog: CatalogConfig {
            base_url: format!("{}/", server.uri()),
            categories,
        },
        crawler: CrawlerConfig {
            concurrency: 4,
            fetch_timeout_secs: 5,
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 2,
            backoff_base_ms: 10,
            backoff_cap_ms: 20,
        },
        output: OutputConfig {
            database_path: dir.path().join("catalog.db").display().to_string(),
            resume_path: dir.path().join("state").join("last_category").display().to_string(),
            report_dir: dir.path().join("reports").display().to_string(),
        },
    }
}

fn url(server: &MockServer, relative: &str) -> String {
    format!("{}/{}", server.uri(), relative)
}

fn item_path(slug: &str) -> String {
    format!("/catalogue/{}/index.html", slug)
}

fn item_href(slug: &str) -> String {
    format!("../../../{}/index.html", slug)
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Travel has two listing pages (alpha, bravo | charlie); Mystery has one (delta)
async fn mount_catalog(server: &MockServer, bravo_price: &str) {
    mount_page(
        server,
        "/",
        home_page(&[(TRAVEL, "Travel"), (MYSTERY, "Mystery")]),
    )
    .await;

    mount_page(
        server,
        &format!("/{}", TRAVEL),
        listing_page(&[&item_href("alpha_1"), &item_href("bravo_2")]),
    )
    .await;
    mount_page(
        server,
        "/catalogue/category/books/travel_2/page-2.html",
        listing_page(&[&item_href("charlie_3")]),
    )
    .await;
    mount_page(
        server,
        &format!("/{}", MYSTERY),
        listing_page(&[&item_href("delta_4")]),
    )
    .await;

    mount_page(server, &item_path("alpha_1"), item_page("Alpha", "10.00", 3, "One")).await;
    mount_page(server, &item_path("bravo_2"), item_page("Bravo", bravo_price, 5, "Four")).await;
    mount_page(server, &item_path("charlie_3"), item_page("Charlie", "30.00", 0, "Five")).await;
    mount_page(server, &item_path("delta_4"), item_page("Delta", "40.00", 7, "Two")).await;
}

fn open_db(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).unwrap()
}

fn read_marker(config: &Config) -> Option<String> {
    FileResumeStore::new(&config.output.resume_path).load().unwrap()
}

#[tokio::test]
async fn test_full_crawl_discovers_categories_and_records_items() {
    let server = MockServer::start().await;
    mount_catalog(&server, "20.00").await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![]);

    let summary = run_crawl(&config, false).await.unwrap();

    assert_eq!(summary.categories_total, 2);
    assert_eq!(summary.categories_completed, 2);
    assert_eq!(summary.items_processed, 4);
    assert_eq!(summary.items_new, 4);
    assert_eq!(summary.items_failed, 0);

    let storage = open_db(&config);
    assert_eq!(storage.count_items().unwrap(), 4);
    assert_eq!(storage.count_changes(ChangeKind::New).unwrap(), 4);

    let bravo = storage
        .find_by_key(&url(&server, "catalogue/bravo_2/index.html"))
        .unwrap()
        .expect("bravo should be stored");
    assert_eq!(bravo.record.title, "Bravo");
    assert_eq!(bravo.record.category, "Travel");
    assert_eq!(bravo.record.price_incl_tax, 20.0);
    assert_eq!(bravo.record.price_excl_tax, 20.0);
    assert_eq!(bravo.record.availability_count, 5);
    assert_eq!(bravo.record.num_reviews, 2);
    assert_eq!(bravo.record.rating, 4);
    assert_eq!(bravo.record.description.as_deref(), Some("About Bravo."));
    assert_eq!(bravo.record.image_url, url(&server, "media/cache/Bravo.jpg"));
    assert_eq!(bravo.fingerprint.len(), 64);

    // Marker names the last completed category
    assert_eq!(read_marker(&config), Some(url(&server, MYSTERY)));
}

#[tokio::test]
async fn test_recrawl_classifies_unchanged_and_updated() {
    let server = MockServer::start().await;
    mount_catalog(&server, "20.00").await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![]);

    let first = run_crawl(&config, false).await.unwrap();
    assert_eq!(first.items_new, 4);

    // The marker sits on the last category, so the whole catalog is crawled again
    let second = run_crawl(&config, false).await.unwrap();
    assert_eq!(second.categories_completed, 2);
    assert_eq!(second.items_unchanged, 4);
    assert_eq!(second.items_new + second.items_updated, 0);
    assert_eq!(open_db(&config).count_changes(ChangeKind::New).unwrap(), 4);

    server.reset().await;
    mount_catalog(&server, "25.50").await;

    let third = run_crawl(&config, false).await.unwrap();
    assert_eq!(third.items_updated, 1);
    assert_eq!(third.items_unchanged, 3);

    let storage = open_db(&config);
    assert_eq!(storage.count_changes(ChangeKind::Updated).unwrap(), 1);
    assert_eq!(storage.count_items().unwrap(), 4);

    let epoch = Utc.timestamp_opt(0, 0).unwrap();
    let changes = storage.list_changes_since(epoch, None).unwrap();
    assert_eq!(changes.len(), 5);

    let update = &changes[0];
    assert_eq!(update.kind, ChangeKind::Updated);
    assert_eq!(update.item_url, url(&server, "catalogue/bravo_2/index.html"));
    match &update.details {
        ChangeDetails::Updated(diff) => {
            assert_eq!(diff.keys().collect::<Vec<_>>(), vec!["price_incl_tax"]);
            assert_eq!(diff["price_incl_tax"].old, serde_json::json!(20.0));
            assert_eq!(diff["price_incl_tax"].new, serde_json::json!(25.5));
        }
        other => panic!("expected a diff, got {:?}", other),
    }

    let stored = storage
        .find_by_key(&url(&server, "catalogue/bravo_2/index.html"))
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.price_incl_tax, 25.5);
}

#[tokio::test]
async fn test_pagination_stops_at_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/travel_2/page-3.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/travel_2/page-4.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[&item_href("zulu_9")])))
        .expect(0)
        .mount(&server)
        .await;
    mount_catalog(&server, "20.00").await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![url(&server, TRAVEL)]);

    let summary = run_crawl(&config, false).await.unwrap();

    assert_eq!(summary.categories_completed, 1);
    assert_eq!(summary.items_new, 3);
    assert!(open_db(&config)
        .find_by_key(&url(&server, "catalogue/zulu_9/index.html"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_resume_marker_skips_completed_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", TRAVEL)))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .expect(0)
        .mount(&server)
        .await;
    mount_catalog(&server, "20.00").await;

    let dir = tempfile::tempdir().unwrap();
    let categories = vec![url(&server, TRAVEL), url(&server, MYSTERY)];
    let config = create_test_config(&server, &dir, categories);
    FileResumeStore::new(&config.output.resume_path)
        .save(&url(&server, TRAVEL))
        .unwrap();

    let summary = run_crawl(&config, false).await.unwrap();

    assert_eq!(summary.categories_skipped, 1);
    assert_eq!(summary.categories_completed, 1);
    assert_eq!(summary.items_new, 1);
    assert_eq!(read_marker(&config), Some(url(&server, MYSTERY)));
}

#[tokio::test]
async fn test_fresh_run_ignores_marker() {
    let server = MockServer::start().await;
    mount_catalog(&server, "20.00").await;

    let dir = tempfile::tempdir().unwrap();
    let categories = vec![url(&server, TRAVEL), url(&server, MYSTERY)];
    let config = create_test_config(&server, &dir, categories);
    FileResumeStore::new(&config.output.resume_path)
        .save(&url(&server, TRAVEL))
        .unwrap();

    let summary = run_crawl(&config, true).await.unwrap();

    assert_eq!(summary.categories_skipped, 0);
    assert_eq!(summary.items_new, 4);
}

#[tokio::test]
async fn test_failed_category_keeps_previous_marker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", MYSTERY)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_catalog(&server, "20.00").await;

    let dir = tempfile::tempdir().unwrap();
    let categories = vec![url(&server, TRAVEL), url(&server, MYSTERY)];
    let config = create_test_config(&server, &dir, categories);

    let summary = run_crawl(&config, false).await.unwrap();

    assert_eq!(summary.categories_completed, 1);
    assert_eq!(summary.categories_failed, 1);
    assert_eq!(summary.items_new, 3);
    assert_eq!(read_marker(&config), Some(url(&server, TRAVEL)));
}

#[tokio::test]
async fn test_failed_item_is_counted_and_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(item_path("charlie_3")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_catalog(&server, "20.00").await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![url(&server, TRAVEL)]);

    let summary = run_crawl(&config, false).await.unwrap();

    assert_eq!(summary.items_processed, 3);
    assert_eq!(summary.items_new, 2);
    assert_eq!(summary.items_failed, 1);
    assert_eq!(summary.categories_completed, 1);
    assert_eq!(open_db(&config).count_items().unwrap(), 2);
}

#[tokio::test]
async fn test_daily_report_after_crawl() {
    let server = MockServer::start().await;
    mount_catalog(&server, "20.00").await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![]);

    run_crawl(&config, false).await.unwrap();

    let report = build_daily_report(&open_db(&config), Utc::now()).unwrap();
    assert_eq!(report.total_changes, 4);
    assert_eq!(report.new_items, 4);
    assert_eq!(report.updated_items, 0);
}

/// Wraps the real fetcher and records how many fetches overlap
struct CountingSource {
    inner: Fetcher,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl DocumentSource for CountingSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.fetch(url).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_concurrency_bound_across_categories() {
    let server = MockServer::start().await;
    let categories = ["travel_2", "mystery_3", "poetry_4"];

    for category in categories {
        let slugs: Vec<String> = (0..6).map(|i| format!("{}-item_{}", category, i)).collect();
        let hrefs: Vec<String> = slugs.iter().map(|s| item_href(s)).collect();
        let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        mount_page(
            &server,
            &format!("/catalogue/category/books/{}/index.html", category),
            listing_page(&hrefs),
        )
        .await;

        for slug in &slugs {
            Mock::given(method("GET"))
                .and(path(item_path(slug)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(item_page(slug, "9.99", 1, "Three"))
                        .set_delay(Duration::from_millis(40)),
                )
                .mount(&server)
                .await;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir, vec![]);
    let fetcher = Fetcher::from_config(&config.crawler, RetryPolicy::from(&config.retry)).unwrap();
    let source = Arc::new(CountingSource {
        inner: fetcher,
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let storage = open_shared(Path::new(&config.output.database_path)).unwrap();
    let resume: Arc<dyn ResumeStore> = Arc::new(FileResumeStore::new(&config.output.resume_path));

    let coordinator = Coordinator::new(
        Arc::clone(&source),
        3,
        &Url::parse(&config.catalog.base_url).unwrap(),
        storage,
        resume,
    )
    .unwrap();

    let category_urls: Vec<String> = categories
        .iter()
        .map(|c| url(&server, &format!("catalogue/category/books/{}/index.html", c)))
        .collect();
    let summary = coordinator.run(&category_urls).await.unwrap();

    assert_eq!(summary.items_new, 18);
    let peak = source.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "observed {} fetches in flight", peak);
    assert!(peak > 1, "items were never fetched concurrently");
}
