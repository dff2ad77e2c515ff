//! Change detection module
//!
//! This module decides, for every extracted item, whether it is new, updated
//! or unchanged since the previous crawl:
//! - Fingerprints over the meaningful subset of an item's fields
//! - Classification against the stored copy, with a field-level diff
//! - The append-only change log entries

mod detector;
mod entry;
mod fingerprint;

pub use detector::{diff_core_fields, ChangeDetector};
pub use entry::{ChangeDetails, ChangeEntry, ChangeKind, FieldDiff, NewItemSummary};
pub use fingerprint::{fingerprint, CoreFields, CORE_FIELDS};
