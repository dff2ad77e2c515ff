//! Item page extraction
//!
//! Turns one item-detail HTML document into an [`ItemRecord`]. Every field
//! is read by its own function that returns either the parsed value or the
//! field's default, so malformed markup degrades a record instead of failing
//! the crawl.

use crate::crawler::walker::with_trailing_slash;
use crate::storage::{ItemRecord, STATUS_SUCCESS};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_CATEGORY: &str = "Unknown";
pub const DEFAULT_AVAILABILITY: &str = "Not available";

const ROW_PRICE_EXCL_TAX: &str = "Price (excl. tax)";
const ROW_PRICE_INCL_TAX: &str = "Price (incl. tax)";
const ROW_AVAILABILITY: &str = "Availability";
const ROW_REVIEWS: &str = "Number of reviews";

/// Position of the review count in the product table when its header is missing
const REVIEWS_ROW_INDEX: usize = 6;

/// Stateless item page parser bound to a catalog base URL
#[derive(Debug, Clone)]
pub struct Extractor {
    catalog_base: Url,
}

impl Extractor {
    /// Image links resolve beneath `catalog_base`, with or without its trailing slash
    pub fn new(catalog_base: &Url) -> Self {
        Self {
            catalog_base: with_trailing_slash(catalog_base),
        }
    }

    /// Extracts a complete record from an item page
    ///
    /// Never fails: absent or unparseable fields take their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_watch::crawler::Extractor;
    /// use chrono::Utc;
    /// use url::Url;
    ///
    /// let extractor = Extractor::new(&Url::parse("https://catalog.example.com/").unwrap());
    /// let record = extractor.extract("https://catalog.example.com/x", "<html></html>", Utc::now());
    /// assert_eq!(record.title, "Unknown Title");
    /// assert_eq!(record.rating, 0);
    /// ```
    pub fn extract(&self, url: &str, html: &str, crawled_at: DateTime<Utc>) -> ItemRecord {
        let document = Html::parse_document(html);
        let table = product_table(&document);

        let availability_raw = extract_availability(&document, &table);
        let availability_count = parse_availability_count(&availability_raw);

        ItemRecord {
            url: url.to_string(),
            title: extract_title(&document),
            description: extract_description(&document),
            category: extract_category(&document),
            price_excl_tax: extract_price(&document, &table, ROW_PRICE_EXCL_TAX),
            price_incl_tax: extract_price(&document, &table, ROW_PRICE_INCL_TAX),
            availability_raw,
            availability_count,
            num_reviews: extract_review_count(&table),
            image_url: extract_image_url(&document, &self.catalog_base),
            rating: extract_rating(&document),
            raw_html: html.to_string(),
            crawled_at,
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

/// A rating as it appears in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingInput<'a> {
    /// Class-like text such as `"star-rating Three"`; the last token counts
    Token(&'a str),
    /// An already-numeric rating
    Numeric(i64),
}

impl RatingInput<'_> {
    /// Maps the input to 1..=5, or 0 when it is unknown or out of range
    pub fn to_rating(self) -> u8 {
        match self {
            Self::Numeric(n) => u8::try_from(n).ok().filter(|r| *r <= 5).unwrap_or(0),
            Self::Token(text) => match text.split_whitespace().last() {
                Some(token) => rating_word(token)
                    .or_else(|| token.parse::<i64>().ok().map(|n| Self::Numeric(n).to_rating()))
                    .unwrap_or(0),
                None => 0,
            },
        }
    }
}

fn rating_word(token: &str) -> Option<u8> {
    match token {
        "One" => Some(1),
        "Two" => Some(2),
        "Three" => Some(3),
        "Four" => Some(4),
        "Five" => Some(5),
        _ => None,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    document.select(&selector).next()
}

/// Text content with runs of whitespace collapsed to single spaces
fn collapsed_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Header/value pairs of the product information table, in document order
fn product_table(document: &Html) -> Vec<(String, String)> {
    let (Some(rows), Some(th), Some(td)) = (selector("table tr"), selector("th"), selector("td"))
    else {
        return Vec::new();
    };

    document
        .select(&rows)
        .map(|row| {
            let header = row.select(&th).next().map(collapsed_text).unwrap_or_default();
            let value = row.select(&td).next().map(collapsed_text).unwrap_or_default();
            (header, value)
        })
        .collect()
}

fn table_value<'a>(table: &'a [(String, String)], header: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(h, _)| h == header)
        .map(|(_, v)| v.as_str())
}

fn extract_title(document: &Html) -> String {
    first(document, "h1")
        .map(collapsed_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// The breadcrumb entry just before the item itself
fn extract_category(document: &Html) -> String {
    let Some(items) = selector("ul.breadcrumb li") else {
        return DEFAULT_CATEGORY.to_string();
    };
    let crumbs: Vec<String> = document.select(&items).map(collapsed_text).collect();

    crumbs
        .len()
        .checked_sub(2)
        .and_then(|idx| crumbs.get(idx))
        .filter(|c| !c.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn extract_description(document: &Html) -> Option<String> {
    first(document, "#product_description ~ p")
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Reads a price from its table row, falling back to the headline price
fn extract_price(document: &Html, table: &[(String, String)], row: &str) -> f64 {
    table_value(table, row)
        .and_then(parse_price)
        .or_else(|| first(document, "p.price_color").and_then(|p| parse_price(&collapsed_text(p))))
        .unwrap_or(0.0)
}

/// Parses a price such as `£51.77` (or its mis-decoded `Â£51.77`)
pub fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn extract_availability(document: &Html, table: &[(String, String)]) -> String {
    first(document, ".availability")
        .map(collapsed_text)
        .filter(|a| !a.is_empty())
        .or_else(|| table_value(table, ROW_AVAILABILITY).map(str::to_string))
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| DEFAULT_AVAILABILITY.to_string())
}

/// Pulls the stock count out of text like `In stock (22 available)`
pub fn parse_availability_count(text: &str) -> u32 {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\((\d+) available\)").ok())
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn extract_review_count(table: &[(String, String)]) -> u32 {
    table_value(table, ROW_REVIEWS)
        .or_else(|| table.get(REVIEWS_ROW_INDEX).map(|(_, v)| v.as_str()))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn extract_image_url(document: &Html, base: &Url) -> String {
    first(document, "#product_gallery img")
        .and_then(|img| img.value().attr("src"))
        .map(strip_parent_segments)
        .filter(|src| !src.is_empty())
        .and_then(|src| base.join(src).ok())
        .map(String::from)
        .unwrap_or_default()
}

fn extract_rating(document: &Html) -> u8 {
    first(document, "p.star-rating")
        .and_then(|p| p.value().attr("class"))
        .map(|class| RatingInput::Token(class).to_rating())
        .unwrap_or(0)
}

/// Drops leading `../` segments from a relative reference
pub(crate) fn strip_parent_segments(href: &str) -> &str {
    let mut rest = href.trim();
    while let Some(stripped) = rest.strip_prefix("../") {
        rest = stripped;
    }
    rest
}
