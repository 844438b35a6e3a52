// src/pipeline/report.rs

//! Per-region errand summary for a stored window.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{Record, TimeWindow};
use crate::storage::RecordSink;
use crate::utils;

/// Errand counts for one canonical region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub region: String,
    /// Errands without the special type
    pub plain: usize,
    /// Errands of the special type
    pub special: usize,
}

/// A tagged record listed for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionEntry {
    pub source: String,
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub link: String,
}

impl From<&Record> for ExceptionEntry {
    fn from(record: &Record) -> Self {
        Self {
            source: record.source.clone(),
            id: record.id,
            timestamp: record.timestamp,
            link: record.link.clone(),
        }
    }
}

/// Summary written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub window: TimeWindow,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    /// Source name to region counts, regions in first-seen order
    pub sources: BTreeMap<String, Vec<RegionCount>>,
    /// Tag text to the records carrying it
    pub exceptions: BTreeMap<String, Vec<ExceptionEntry>>,
}

impl Report {
    /// Group `records` by source and region, setting tagged ones aside.
    pub fn build(window: TimeWindow, records: &[Record]) -> Self {
        let mut sources: BTreeMap<String, Vec<RegionCount>> = BTreeMap::new();
        let mut exceptions: BTreeMap<String, Vec<ExceptionEntry>> = BTreeMap::new();

        for record in records.iter().filter(|r| r.errand) {
            if let Some(tag) = record.error {
                exceptions
                    .entry(tag.to_string())
                    .or_default()
                    .push(ExceptionEntry::from(record));
                continue;
            }

            let counts = sources.entry(record.source.clone()).or_default();
            for region in &record.regions {
                let index = match counts.iter().position(|c| &c.region == region) {
                    Some(index) => index,
                    None => {
                        counts.push(RegionCount {
                            region: region.clone(),
                            plain: 0,
                            special: 0,
                        });
                        counts.len() - 1
                    }
                };
                if record.errand_type {
                    counts[index].special += 1;
                } else {
                    counts[index].plain += 1;
                }
            }
        }

        Self {
            window,
            generated_at: Utc::now(),
            total: records.len(),
            sources,
            exceptions,
        }
    }

    /// Counts for one source and region.
    pub fn count(&self, source: &str, region: &str) -> Option<&RegionCount> {
        self.sources.get(source)?.iter().find(|c| c.region == region)
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.values().map(Vec::len).sum()
    }

    /// Write the report as pretty JSON to `{dir}/summary.json`.
    pub async fn write(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join("summary.json");
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Build the report for `window` from stored records and write it.
///
/// Returns `None` without writing when nothing is stored in the window.
pub async fn run_report(
    sink: &dyn RecordSink,
    window: TimeWindow,
    report_dir: impl AsRef<Path>,
) -> Result<Option<Report>> {
    let records = sink.records_between(&window).await?;
    if records.is_empty() {
        log::warn!("No stored records in {}, report skipped", window);
        return Ok(None);
    }

    let report = Report::build(window, &records);
    let path = report.write(report_dir).await?;

    utils::log::summary(
        "Report",
        &[
            ("Window", window.to_string()),
            ("Records", report.total.to_string()),
            ("Sources", report.sources.len().to_string()),
            ("Exceptions", report.exception_count().to_string()),
            ("Written to", path.display().to_string()),
        ],
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, ErrorTag};
    use crate::storage::MemoryStorage;

    fn errand(id: i64, source: &str, regions: &[&str], errand_type: bool) -> Record {
        Record::new(id, "text", DateTime::from_timestamp(1_000 + id, 0).unwrap())
            .with_source(source)
            .classified(Classification {
                regions: regions.iter().map(|r| r.to_string()).collect(),
                errand_type,
                error: None,
            })
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            DateTime::from_timestamp(0, 0).unwrap(),
            DateTime::from_timestamp(10_000, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_counts_plain_and_special_per_region() {
        let mut tagged = errand(4, "a", &[], false);
        tagged.tag(ErrorTag::NoRegion);

        let records = vec![
            errand(1, "a", &["Northland"], false),
            errand(2, "a", &["Northland"], true),
            errand(3, "a", &["Southland", "Northland"], false),
            tagged,
            errand(5, "b", &["Westvale"], true),
        ];
        let report = Report::build(window(), &records);

        assert_eq!(report.total, 5);
        let north = report.count("a", "Northland").unwrap();
        assert_eq!((north.plain, north.special), (2, 1));
        let south = report.count("a", "Southland").unwrap();
        assert_eq!((south.plain, south.special), (1, 0));
        assert_eq!(report.count("b", "Westvale").unwrap().special, 1);

        assert_eq!(report.exception_count(), 1);
        assert_eq!(report.exceptions["no region found"][0].id, 4);
    }

    #[tokio::test]
    async fn test_run_report_writes_summary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = MemoryStorage::with_records(vec![errand(1, "a", &["Northland"], false)]);

        let report = run_report(&storage, window(), tmp.path()).await.unwrap().unwrap();
        assert_eq!(report.total, 1);

        let written = std::fs::read_to_string(tmp.path().join("summary.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["sources"]["a"][0]["region"], "Northland");
        assert_eq!(value["sources"]["a"][0]["plain"], 1);
    }

    #[tokio::test]
    async fn test_run_report_skips_empty_window() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = MemoryStorage::new();

        assert!(run_report(&storage, window(), tmp.path()).await.unwrap().is_none());
        assert!(!tmp.path().join("summary.json").exists());
    }
}
