//! Content fingerprints
//!
//! A fingerprint is a SHA-256 digest over the fields whose change is
//! meaningful to a shopper: title, tax-inclusive price, stock count and
//! rating. Everything else on a record (raw HTML, crawl time, description,
//! review count) is ignored, so re-crawling an unchanged page yields the
//! same digest.

use crate::storage::ItemRecord;
use sha2::{Digest, Sha256};

/// Field names in the fixed order they are hashed
pub const CORE_FIELDS: [&str; 4] = ["title", "price_incl_tax", "availability_count", "rating"];

/// The fingerprinted subset of an item. Absent values hash as ""/0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreFields<'a> {
    pub title: Option<&'a str>,
    pub price_incl_tax: Option<f64>,
    pub availability_count: Option<u32>,
    pub rating: Option<u8>,
}

impl<'a> From<&'a ItemRecord> for CoreFields<'a> {
    fn from(record: &'a ItemRecord) -> Self {
        Self {
            title: Some(&record.title),
            price_incl_tax: Some(record.price_incl_tax),
            availability_count: Some(record.availability_count),
            rating: Some(record.rating),
        }
    }
}

impl CoreFields<'_> {
    /// Canonical text of each core field, in `CORE_FIELDS` order
    pub fn canonical_values(&self) -> [String; 4] {
        [
            self.title.unwrap_or("").to_string(),
            canonical_price(self.price_incl_tax.unwrap_or(0.0)),
            self.availability_count.unwrap_or(0).to_string(),
            self.rating.unwrap_or(0).to_string(),
        ]
    }
}

/// -0.0 and 0.0 compare equal and must hash equal; every NaN hashes alike.
fn canonical_price(price: f64) -> String {
    if price.is_nan() {
        "NaN".to_string()
    } else if price == 0.0 {
        "0".to_string()
    } else {
        price.to_string()
    }
}

/// Computes the hex-encoded fingerprint of a record's core fields
///
/// Each field is written as name, value length and value, so no choice of
/// title can collide with a different split of the same bytes.
pub fn fingerprint<'a>(fields: impl Into<CoreFields<'a>>) -> String {
    let fields = fields.into();
    let mut hasher = Sha256::new();

    for (name, value) in CORE_FIELDS.iter().zip(fields.canonical_values()) {
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    hex::encode(hasher.finalize())
}
