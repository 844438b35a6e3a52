//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── manifest.json         # Stored range and record count
//! └── records/              # Month partitions
//!     └── YYYY/
//!         └── MM.json
//! ```
//!
//! Partitions are merged with what is already on disk, deduplicated by
//! `(source, id)` and kept sorted by timestamp. Every file is written to a
//! temporary path first and then renamed into place; the manifest is written
//! last.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::models::{Record, TimeWindow};
use crate::storage::{Manifest, RecordSink, drain};

const MANIFEST_KEY: &str = "manifest.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Partition key for a given year/month.
    fn partition_key(year: i32, month: u32) -> String {
        format!("records/{}/{:02}.json", year, month)
    }

    /// Load the manifest, if one was written.
    pub async fn manifest(&self) -> Result<Option<Manifest>> {
        self.read_json(MANIFEST_KEY).await
    }

    /// Load one month partition.
    pub async fn load_partition(&self, year: i32, month: u32) -> Result<Vec<Record>> {
        Ok(self
            .read_json(&Self::partition_key(year, month))
            .await?
            .unwrap_or_default())
    }

    /// Merge `batch` into the month partitions and refresh the manifest.
    ///
    /// Returns the number of records that were not stored before.
    async fn write_partitions(&self, batch: Vec<Record>) -> Result<usize> {
        let mut by_month: BTreeMap<(i32, u32), Vec<Record>> = BTreeMap::new();
        for record in batch {
            let period = (record.timestamp.year(), record.timestamp.month());
            by_month.entry(period).or_default().push(record);
        }

        let mut added = 0;
        let mut batch_min: Option<DateTime<Utc>> = None;
        let mut batch_max: Option<DateTime<Utc>> = None;

        for ((year, month), records) in by_month {
            let key = Self::partition_key(year, month);
            let mut existing = self.load_partition(year, month).await?;
            let mut seen: HashSet<(String, i64)> = existing
                .iter()
                .map(|r| (r.source.clone(), r.id))
                .collect();

            for record in records {
                batch_min = Some(batch_min.map_or(record.timestamp, |t| t.min(record.timestamp)));
                batch_max = Some(batch_max.map_or(record.timestamp, |t| t.max(record.timestamp)));
                if seen.insert((record.source.clone(), record.id)) {
                    existing.push(record);
                    added += 1;
                }
            }

            existing.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            self.write_json(&key, &existing).await?;
            log::info!("{} records written to {}", existing.len(), key);
        }

        let previous = self.manifest().await?;
        let (count, min, max) = match previous {
            Some(m) => (
                m.count + added,
                earliest(m.min, batch_min),
                latest(m.max, batch_max),
            ),
            None => (added, batch_min, batch_max),
        };
        let manifest = Manifest {
            updated_at: Utc::now(),
            count,
            min,
            max,
        };
        self.write_json(MANIFEST_KEY, &manifest).await?;

        Ok(added)
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Every `(year, month)` touched by the window, in order.
fn months_in(window: &TimeWindow) -> Vec<(i32, u32)> {
    let (mut year, mut month) = (window.from.year(), window.from.month());
    let end = (window.to.year(), window.to.month());
    let mut months = Vec::new();
    while (year, month) <= end {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

#[async_trait]
impl RecordSink for LocalStorage {
    async fn save_batch(&self, records: mpsc::Receiver<Record>) -> Result<usize> {
        let batch = drain(records).await;
        if batch.is_empty() {
            log::info!("No records to save");
            return Ok(0);
        }

        let received = batch.len();
        let added = self.write_partitions(batch).await.map_err(|e| {
            log::error!("Failed to save batch: {}", e);
            AppError::save(e)
        })?;
        log::info!(
            "Saved batch to {}: received={}, new={}",
            self.root_dir.display(),
            received,
            added
        );
        Ok(received)
    }

    async fn time_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let manifest = self.manifest().await.map_err(AppError::query)?;
        Ok(manifest.and_then(|m| m.range()))
    }

    async fn records_between(&self, window: &TimeWindow) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for (year, month) in months_in(window) {
            let partition = self
                .load_partition(year, month)
                .await
                .map_err(AppError::query)?;
            records.extend(partition.into_iter().filter(|r| window.contains(r.timestamp)));
        }
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }
}
