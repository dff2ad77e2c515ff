//! Change detection against the stored copy of an item

use crate::changes::entry::{ChangeEntry, FieldDiff};
use crate::changes::fingerprint::{fingerprint, CoreFields, CORE_FIELDS};
use crate::storage::{self, ItemRecord, SharedStorage, StorageResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Classifies freshly extracted items as new, updated or unchanged and keeps
/// the store and change log in step with that decision.
#[derive(Clone)]
pub struct ChangeDetector {
    storage: SharedStorage,
}

impl ChangeDetector {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Applies one extracted record
    ///
    /// The lookup, the upsert and the change-log append run while holding the
    /// store handle, and the two writes share one transaction, so two tasks can
    /// never interleave on the same URL.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(entry))` - The item is new or its fingerprint changed
    /// * `Ok(None)` - Nothing meaningful changed; presentational fields were refreshed
    /// * `Err(StorageError)` - The store could not be read or written
    pub fn apply(&self, record: &ItemRecord) -> StorageResult<Option<ChangeEntry>> {
        let current = fingerprint(record);
        let mut store = storage::lock(&self.storage)?;

        let entry = match store.find_by_key(&record.url)? {
            None => Some(ChangeEntry::new_item(record, record.crawled_at)),
            Some(stored) if stored.fingerprint != current => {
                let diff = diff_core_fields(&stored.record, record);
                Some(ChangeEntry::updated(&record.url, diff, record.crawled_at))
            }
            Some(_) => None,
        };

        store.record_item(record, &current, entry.as_ref())?;

        match &entry {
            Some(entry) => tracing::info!("{} item: {} ({})", entry.kind, record.title, record.url),
            None => tracing::debug!("Unchanged item: {}", record.url),
        }

        Ok(entry)
    }
}

/// Lists the fingerprinted fields whose values differ between two records
///
/// Fields outside the fingerprint are never reported, even if they changed.
pub fn diff_core_fields(old: &ItemRecord, new: &ItemRecord) -> BTreeMap<String, FieldDiff> {
    let old_canonical = CoreFields::from(old).canonical_values();
    let new_canonical = CoreFields::from(new).canonical_values();
    let old_values = core_values(old);
    let new_values = core_values(new);

    CORE_FIELDS
        .iter()
        .enumerate()
        .filter(|(i, _)| old_canonical[*i] != new_canonical[*i])
        .map(|(i, name)| {
            (
                name.to_string(),
                FieldDiff {
                    old: old_values[i].clone(),
                    new: new_values[i].clone(),
                },
            )
        })
        .collect()
}

fn core_values(record: &ItemRecord) -> [Value; 4] {
    [
        json!(record.title),
        json!(record.price_incl_tax),
        json!(record.availability_count),
        json!(record.rating),
    ]
}
