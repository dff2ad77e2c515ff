//! State module for tracking crawl progress across runs
//!
//! # Components
//!
//! - `ResumeStore`: durable marker of the last fully crawled category
//! - `plan_categories`: decides which categories a run still has to visit

mod resume;

// Re-export main types
pub use resume::{
    plan_categories, FileResumeStore, MemoryResumeStore, ResumeError, ResumePlan, ResumeResult,
    ResumeStore,
};
