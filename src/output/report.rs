//! Daily change report export
//!
//! Collects the change entries detected since the start of the current UTC
//! day and writes them as `change_report_<YYYY-MM-DD>.json`.

use crate::changes::{ChangeEntry, ChangeKind};
use crate::output::OutputResult;
use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One day's change activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReport {
    /// UTC calendar day covered, `YYYY-MM-DD`
    pub report_date: String,
    pub generated_at: DateTime<Utc>,
    pub total_changes: usize,
    pub new_items: usize,
    pub updated_items: usize,
    /// Entries of the day, most recent first
    pub changes: Vec<ChangeEntry>,
}

impl ChangeReport {
    pub fn file_name(&self) -> String {
        format!("change_report_{}.json", self.report_date)
    }
}

/// Builds the report for the UTC day containing `now`
pub fn build_daily_report(storage: &dyn Storage, now: DateTime<Utc>) -> StorageResult<ChangeReport> {
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now);

    let changes = storage.list_changes_since(start_of_day, None)?;
    let count = |kind: ChangeKind| changes.iter().filter(|c| c.kind == kind).count();

    Ok(ChangeReport {
        report_date: now.format("%Y-%m-%d").to_string(),
        generated_at: now,
        total_changes: changes.len(),
        new_items: count(ChangeKind::New),
        updated_items: count(ChangeKind::Updated),
        changes,
    })
}

/// Writes the report as pretty-printed JSON into `dir`, returning the file path
pub fn write_daily_report(report: &ChangeReport, dir: &Path) -> OutputResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;

    tracing::info!("Wrote change report with {} entries to {}", report.total_changes, path.display());
    Ok(path)
}
