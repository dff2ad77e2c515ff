//! Crawl resumption at category granularity
//!
//! The marker names the last category whose traversal finished. It is read
//! once when a crawl starts and rewritten after every completed category, so
//! a crash re-processes at most the category that was in progress.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while reading or writing the resume marker
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Failed to access resume marker at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Resume marker store is poisoned")]
    Poisoned,
}

/// Result type for resume marker operations
pub type ResumeResult<T> = Result<T, ResumeError>;

/// Durable single-value store for the resume marker
pub trait ResumeStore: Send + Sync {
    /// Returns the last completed category, or `None` when starting fresh
    fn load(&self) -> ResumeResult<Option<String>>;

    /// Records `category` as the last completed category
    fn save(&self, category: &str) -> ResumeResult<()>;

    /// Forgets any recorded progress
    fn clear(&self) -> ResumeResult<()> {
        self.save("")
    }
}

/// Resume marker kept in a plain text file
#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> ResumeError {
        ResumeError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResumeStore for FileResumeStore {
    fn load(&self) -> ResumeResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let marker = content.trim();
                Ok((!marker.is_empty()).then(|| marker.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, category: &str) -> ResumeResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // Write-then-rename keeps the previous marker intact if we crash mid-write
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(category.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}

/// Resume marker held in memory, for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    marker: Mutex<Option<String>>,
}

impl MemoryResumeStore {
    pub fn new(marker: Option<&str>) -> Self {
        Self {
            marker: Mutex::new(marker.map(str::to_string)),
        }
    }
}

impl ResumeStore for MemoryResumeStore {
    fn load(&self) -> ResumeResult<Option<String>> {
        let marker = self.marker.lock().map_err(|_| ResumeError::Poisoned)?;
        Ok(marker.clone().filter(|m| !m.is_empty()))
    }

    fn save(&self, category: &str) -> ResumeResult<()> {
        let mut marker = self.marker.lock().map_err(|_| ResumeError::Poisoned)?;
        *marker = Some(category.to_string());
        Ok(())
    }
}

/// Which categories a run should process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Categories still to crawl, in order
    pub pending: Vec<String>,

    /// Number of leading categories skipped as already done
    pub skipped: usize,

    /// The marker pointed at the final category; progress starts over
    pub reset: bool,
}

/// Works out the pending categories given the last completed one
///
/// Categories at or before the marker are skipped. A marker on the final
/// category means the previous run finished, so everything is pending again.
/// An unknown marker is ignored.
pub fn plan_categories(categories: &[String], marker: Option<&str>) -> ResumePlan {
    let position = marker.and_then(|m| categories.iter().position(|c| c == m));

    match position {
        Some(idx) if idx + 1 < categories.len() => ResumePlan {
            pending: categories[idx + 1..].to_vec(),
            skipped: idx + 1,
            reset: false,
        },
        Some(_) => ResumePlan {
            pending: categories.to_vec(),
            skipped: 0,
            reset: true,
        },
        None => ResumePlan {
            pending: categories.to_vec(),
            skipped: 0,
            reset: false,
        },
    }
}
