//! Category listing traversal
//!
//! A category is a sequence of listing pages. Page 1 is the category URL
//! itself and page N replaces `index.html` with `page-N.html`. Pages are
//! fetched one at a time until the catalog answers "not found" or a page
//! lists no items.

use crate::crawler::extractor::strip_parent_segments;
use crate::crawler::fetcher::{DocumentSource, FetchError};
use scraper::{Html, Selector};
use url::Url;

const INDEX_PAGE: &str = "index.html";

/// Walks category listings and resolves item links against the catalog
#[derive(Debug, Clone)]
pub struct CategoryWalker {
    catalog_base: Url,
    item_base: Url,
}

impl CategoryWalker {
    /// Item links resolve under `<catalog_base>/catalogue/`
    pub fn new(catalog_base: &Url) -> Result<Self, url::ParseError> {
        let catalog_base = with_trailing_slash(catalog_base);
        let item_base = catalog_base.join("catalogue/")?;
        Ok(Self {
            catalog_base,
            item_base,
        })
    }

    /// Starts a lazy, page-by-page traversal of one category
    pub fn pages<'a, S: DocumentSource>(
        &'a self,
        source: &'a S,
        category_url: &str,
    ) -> CategoryPages<'a, S> {
        CategoryPages {
            source,
            item_base: &self.item_base,
            category_url: category_url.to_string(),
            next_page: 1,
            done: false,
        }
    }

    /// Collects every item URL of a category, in listing order
    pub async fn list_items<S: DocumentSource>(
        &self,
        source: &S,
        category_url: &str,
    ) -> Result<Vec<String>, FetchError> {
        let mut pages = self.pages(source, category_url);
        let mut items = Vec::new();
        while let Some(links) = pages.next_page().await? {
            items.extend(links);
        }
        Ok(items)
    }

    /// Reads the category list from the catalog home page's side navigation
    ///
    /// The first navigation link is the catalog-wide root and is skipped.
    pub async fn discover_categories<S: DocumentSource>(
        &self,
        source: &S,
    ) -> Result<Vec<String>, FetchError> {
        let html = source.fetch(self.catalog_base.as_str()).await?;
        let categories = extract_category_links(&html, &self.catalog_base);
        tracing::info!("Discovered {} categories", categories.len());
        Ok(categories)
    }
}

/// In-progress traversal of one category
pub struct CategoryPages<'a, S> {
    source: &'a S,
    item_base: &'a Url,
    category_url: String,
    next_page: u32,
    done: bool,
}

impl<S: DocumentSource> CategoryPages<'_, S> {
    /// Fetches the next listing page
    ///
    /// Returns `Ok(None)` once pagination is exhausted; no further requests
    /// are made after that or after an error.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, FetchError> {
        if self.done {
            return Ok(None);
        }

        let url = page_url(&self.category_url, self.next_page);
        let html = match self.source.fetch(&url).await {
            Ok(html) => html,
            Err(e) if e.is_not_found() => {
                tracing::debug!("No page {} for {}", self.next_page, self.category_url);
                self.done = true;
                return Ok(None);
            }
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        let links = extract_item_links(&html, self.item_base);
        if links.is_empty() {
            tracing::debug!("Page {} of {} lists no items", self.next_page, self.category_url);
            self.done = true;
            return Ok(None);
        }

        tracing::debug!(
            "Page {} of {}: {} items",
            self.next_page,
            self.category_url,
            links.len()
        );
        self.next_page += 1;
        Ok(Some(links))
    }
}

/// URL of the given 1-based listing page of a category
pub fn page_url(category_url: &str, page: u32) -> String {
    if page <= 1 {
        return category_url.to_string();
    }

    let page_file = format!("page-{}.html", page);
    if let Some(idx) = category_url.rfind(INDEX_PAGE) {
        let mut url = category_url.to_string();
        url.replace_range(idx..idx + INDEX_PAGE.len(), &page_file);
        return url;
    }

    Url::parse(category_url)
        .map(|u| with_trailing_slash(&u))
        .and_then(|u| u.join(&page_file))
        .map(String::from)
        .unwrap_or_else(|_| format!("{}/{}", category_url.trim_end_matches('/'), page_file))
}

/// Directory form of a URL, so relative references resolve beneath its last segment
pub(crate) fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Absolute item URLs listed on a category page
fn extract_item_links(html: &str, item_base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("article.product_pod h3 a") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(strip_parent_segments)
        .filter(|href| !href.is_empty())
        .filter_map(|href| item_base.join(href).ok())
        .map(String::from)
        .collect()
}

fn extract_category_links(html: &str, catalog_base: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse(".side_categories a") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut categories: Vec<String> = Vec::new();
    for link in document
        .select(&selector)
        .skip(1)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| catalog_base.join(href.trim()).ok())
        .map(String::from)
    {
        if !categories.contains(&link) {
            categories.push(link);
        }
    }
    categories
}
