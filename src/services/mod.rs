//! Service layer for fetching message histories.
//!
//! - History paging per source (`HistoryWalker`)
//! - Text extraction and permalink resolution (`EnrichmentWorkerPool`)
//! - Fan-out over all sources with shared counters (`FetchCoordinator`)

mod enrich;
mod fetcher;
mod history;

pub use enrich::{EnrichmentWorkerPool, normalize_message};
pub use fetcher::{FetchCoordinator, FetchRun, FetchSnapshot, FetchStats};
pub use history::{HistoryWalker, WalkSummary};
