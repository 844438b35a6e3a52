//! In-process record sink for tests and dry runs.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::{Record, TimeWindow};
use crate::storage::{RecordSink, drain};

/// Keeps every saved record in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Mutex<Vec<Record>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `records`.
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Copy of everything stored so far.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordSink for MemoryStorage {
    async fn save_batch(&self, records: mpsc::Receiver<Record>) -> Result<usize> {
        let batch = drain(records).await;
        if batch.is_empty() {
            log::info!("No records to save");
            return Ok(0);
        }

        let received = batch.len();
        let mut stored = self
            .records
            .lock()
            .map_err(|e| AppError::save(format!("memory storage poisoned: {e}")))?;
        let mut seen: HashSet<(String, i64)> =
            stored.iter().map(|r| (r.source.clone(), r.id)).collect();
        for record in batch {
            if seen.insert((record.source.clone(), record.id)) {
                stored.push(record);
            }
        }
        Ok(received)
    }

    async fn time_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let stored = self
            .records
            .lock()
            .map_err(|e| AppError::query(format!("memory storage poisoned: {e}")))?;
        let min = stored.iter().map(|r| r.timestamp).min();
        let max = stored.iter().map(|r| r.timestamp).max();
        Ok(min.zip(max))
    }

    async fn records_between(&self, window: &TimeWindow) -> Result<Vec<Record>> {
        let stored = self
            .records
            .lock()
            .map_err(|e| AppError::query(format!("memory storage poisoned: {e}")))?;
        let mut records: Vec<Record> = stored
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }
}
