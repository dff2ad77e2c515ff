//! Change log entries
//!
//! A change entry is written once per detected transition and never touched
//! again afterwards.

use crate::storage::{ItemRecord, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of transition recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Updated,
}

impl ChangeKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Updated => "updated",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Snapshot of a newly seen item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItemSummary {
    pub title: String,
    pub category: String,
    pub price_incl_tax: f64,
    pub rating: u8,
}

/// Old and new value of one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// Payload of a change entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChangeDetails {
    New(NewItemSummary),
    /// Changed fingerprint fields keyed by field name
    Updated(BTreeMap<String, FieldDiff>),
}

impl ChangeDetails {
    pub fn to_json(&self) -> StorageResult<String> {
        let encoded = match self {
            Self::New(summary) => serde_json::to_string(summary),
            Self::Updated(diff) => serde_json::to_string(diff),
        };
        encoded.map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn from_json(kind: ChangeKind, json: &str) -> StorageResult<Self> {
        let decoded = match kind {
            ChangeKind::New => serde_json::from_str(json).map(Self::New),
            ChangeKind::Updated => serde_json::from_str(json).map(Self::Updated),
        };
        decoded.map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// One append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub item_url: String,
    pub kind: ChangeKind,
    pub detected_at: DateTime<Utc>,
    pub details: ChangeDetails,
}

impl ChangeEntry {
    /// Entry for an item seen for the first time
    pub fn new_item(record: &ItemRecord, detected_at: DateTime<Utc>) -> Self {
        Self {
            item_url: record.url.clone(),
            kind: ChangeKind::New,
            detected_at,
            details: ChangeDetails::New(NewItemSummary {
                title: record.title.clone(),
                category: record.category.clone(),
                price_incl_tax: record.price_incl_tax,
                rating: record.rating,
            }),
        }
    }

    /// Entry for an item whose fingerprint fields changed
    pub fn updated(
        item_url: &str,
        diff: BTreeMap<String, FieldDiff>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            item_url: item_url.to_string(),
            kind: ChangeKind::Updated,
            detected_at,
            details: ChangeDetails::Updated(diff),
        }
    }

    /// The field diff of an `updated` entry
    pub fn diff(&self) -> Option<&BTreeMap<String, FieldDiff>> {
        match &self.details {
            ChangeDetails::Updated(diff) => Some(diff),
            ChangeDetails::New(_) => None,
        }
    }
}
