//! Storage abstractions for classified records.
//!
//! Records are partitioned by publication month; a manifest tracks the
//! stored time range so repeated runs only fetch what is missing.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── manifest.json         # updated_at, count, min, max
//! └── records/
//!     ├── 2025/
//!     │   ├── 11.json
//!     │   └── 12.json
//!     └── 2026/
//!         └── 01.json
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{Record, TimeWindow};

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Summary of everything stored, kept in `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Total record count
    pub count: usize,
    /// Oldest stored record
    pub min: Option<DateTime<Utc>>,
    /// Newest stored record
    pub max: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Stored range, if anything is stored.
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.min.zip(self.max)
    }
}

/// Trait for record sinks.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Drain the stream and persist everything in one step.
    ///
    /// Returns the number of records received. Fails with `AppError::Save`.
    async fn save_batch(&self, records: mpsc::Receiver<Record>) -> Result<usize>;

    /// Oldest and newest stored timestamps, `None` when empty.
    async fn time_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>>;

    /// Stored records inside `window`, ordered by timestamp.
    async fn records_between(&self, window: &TimeWindow) -> Result<Vec<Record>>;
}

/// Collect a record stream into a vector.
pub(crate) async fn drain(mut records: mpsc::Receiver<Record>) -> Vec<Record> {
    let mut batch = Vec::new();
    while let Some(record) = records.recv().await {
        batch.push(record);
    }
    batch
}
