//! In-memory document source and page builders for crawler unit tests

use crate::crawler::fetcher::{DocumentSource, FetchError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serves canned pages; unknown URLs answer 404
#[derive(Default)]
pub(crate) struct StaticSource {
    pages: Mutex<HashMap<String, String>>,
    statuses: HashMap<String, u16>,
    delay: Duration,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(self, url: &str, html: String) -> Self {
        self.set_page(url, html);
        self
    }

    pub(crate) fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn set_page(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of fetches observed in flight at once
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl DocumentSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(status) = self.statuses.get(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        let page = self.pages.lock().unwrap().get(url).cloned();
        page.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// A category listing page linking to the given item hrefs
pub(crate) fn listing_page(hrefs: &[&str]) -> String {
    let articles: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<li><article class="product_pod"><h3><a href="{}" title="x">x</a></h3></article></li>"#,
                href
            )
        })
        .collect();
    format!("<html><body><ol class=\"row\">{}</ol></body></html>", articles)
}

/// An item detail page with the core fields set
pub(crate) fn item_page(title: &str, price_incl_tax: &str, available: u32, rating_word: &str) -> String {
    format!(
        r#"<html><body>
<ul class="breadcrumb"><li>Home</li><li>Books</li><li>Travel</li><li>{title}</li></ul>
<h1>{title}</h1>
<p class="price_color">£{price}</p>
<p class="instock availability">In stock ({available} available)</p>
<p class="star-rating {rating_word}"></p>
<table class="table table-striped">
<tr><th>Price (excl. tax)</th><td>£{price}</td></tr>
<tr><th>Price (incl. tax)</th><td>£{price}</td></tr>
<tr><th>Number of reviews</th><td>0</td></tr>
</table>
</body></html>"#,
        title = title,
        price = price_incl_tax,
        available = available,
        rating_word = rating_word,
    )
}
