//! Pipeline entry points.
//!
//! - `Runner`: fetch the uncovered parts of a window, classify and save
//! - `ClassificationPipeline`: engine worker pool over a record stream
//! - `run_report`: summarize stored errands per source and region

pub mod classify;
pub mod report;
pub mod run;

pub use classify::{ClassificationPipeline, ClassifyRun, ClassifySnapshot, ClassifyStats};
pub use report::{ExceptionEntry, RegionCount, Report, run_report};
pub use run::{RunSummary, Runner};
