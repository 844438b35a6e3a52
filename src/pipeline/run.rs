// src/pipeline/run.rs

//! Fetch, classify, validate and save one requested window.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::{ClassificationEngine, Matchers, tag_exceptions};
use crate::error::{AppError, Result};
use crate::models::{Config, Record, TimeWindow};
use crate::pipeline::classify::{ClassificationPipeline, ClassifyRun, ClassifySnapshot};
use crate::services::{FetchCoordinator, FetchRun, FetchSnapshot};
use crate::sources::MessageSource;
use crate::storage::{RecordSink, drain};
use crate::utils;

/// Outcome of a run across every fetched sub-window.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    /// Sub-windows that were actually fetched
    pub windows: Vec<TimeWindow>,
    pub fetch: FetchSnapshot,
    pub classify: ClassifySnapshot,
    /// Records handed to the sink
    pub saved: usize,
    /// Records that left validation with a tag
    pub tagged: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: RunSummary) {
        self.windows.extend(other.windows);
        self.fetch.absorb(other.fetch);
        self.classify.absorb(other.classify);
        self.saved += other.saved;
        self.tagged += other.tagged;
    }
}

/// Composes fetching, classification, validation and the sink.
pub struct Runner {
    coordinator: FetchCoordinator,
    classifier: ClassificationPipeline,
    sink: Arc<dyn RecordSink>,
    capacity: usize,
}

impl Runner {
    pub fn new(
        coordinator: FetchCoordinator,
        classifier: ClassificationPipeline,
        sink: Arc<dyn RecordSink>,
        capacity: usize,
    ) -> Self {
        Self {
            coordinator,
            classifier,
            sink,
            capacity: capacity.max(1),
        }
    }

    /// Runner for every source declared in `config`.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn MessageSource>,
        matchers: Arc<Matchers>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        let coordinator =
            FetchCoordinator::new(source, config.source_names(), config.fetch.clone());
        let classifier = ClassificationPipeline::new(
            ClassificationEngine::from_config(matchers, config),
            config.classify.workers,
            config.fetch.channel_capacity,
        );
        Self::new(coordinator, classifier, sink, config.fetch.channel_capacity)
    }

    /// Fetch the parts of `window` that are not stored yet.
    pub async fn run(&self, window: TimeWindow, cancel: &CancellationToken) -> Result<RunSummary> {
        let windows = match self.sink.time_range().await? {
            None => {
                log::info!("Storage is empty, fetching the whole window {}", window);
                vec![window]
            }
            Some((min, max)) => {
                let gaps = window.uncovered(min, max);
                if gaps.is_empty() {
                    log::info!("Window {} is already stored", window);
                }
                gaps
            }
        };

        let total = windows.len();
        let mut summary = RunSummary::default();
        for (step, gap) in windows.into_iter().enumerate() {
            utils::log::step(step + 1, total, &format!("Fetching {}", gap));
            let part = self.fetch_and_save(gap, cancel).await?;
            summary.absorb(part);
        }

        utils::log::summary(
            "Run",
            &[
                ("Windows", summary.windows.len().to_string()),
                ("Yielded", summary.fetch.yielded.to_string()),
                ("Forwarded", summary.fetch.forwarded().to_string()),
                ("Filtered", summary.fetch.filtered.to_string()),
                ("Link errors", summary.fetch.errors.to_string()),
                ("Failed sources", summary.fetch.source_failures.to_string()),
                ("Errands", summary.classify.classified.to_string()),
                ("Low confidence", summary.classify.low_confidence.to_string()),
                ("Tagged", summary.tagged.to_string()),
                ("Saved", summary.saved.to_string()),
            ],
        );
        Ok(summary)
    }

    /// Run every stage over one window and save the result in one batch.
    ///
    /// The stream is collected before the sink is called. Nothing is saved
    /// when cancellation is observed during collection; once the batch is
    /// handed to the sink the save runs to completion.
    pub async fn fetch_and_save(
        &self,
        window: TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let token = cancel.child_token();

        let FetchRun {
            records,
            stats: fetch_stats,
            handle: fetch_handle,
        } = self.coordinator.start(window, token.clone());
        let ClassifyRun {
            records,
            stats: classify_stats,
            handle: classify_handle,
        } = self.classifier.start(records, token.clone());
        let (records, validate_handle) = validate_stage(records, self.capacity, token.clone());

        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            batch = drain(records) => Some(batch),
        };
        let saved = match batch {
            Some(batch) if !token.is_cancelled() => self.sink.save_batch(replay(batch)).await,
            _ => Err(AppError::Cancelled),
        };
        if saved.is_err() {
            token.cancel();
        }

        for (stage, handle) in [("fetch", fetch_handle), ("classify", classify_handle)] {
            if let Err(e) = handle.await {
                log::error!("The {} stage panicked: {}", stage, e);
            }
        }
        let tagged = match validate_handle.await {
            Ok(tagged) => tagged,
            Err(e) => {
                log::error!("The validation stage panicked: {}", e);
                0
            }
        };

        let saved = match saved {
            Ok(saved) => saved,
            Err(AppError::Cancelled) => {
                log::warn!("Run cancelled, nothing saved for {}", window);
                return Err(AppError::Cancelled);
            }
            Err(e) => {
                log::error!("Failed to save records for {}: {}", window, e);
                return Err(e);
            }
        };

        Ok(RunSummary {
            windows: vec![window],
            fetch: fetch_stats.snapshot(),
            classify: classify_stats.snapshot(),
            saved,
            tagged,
        })
    }
}

/// Re-open a collected batch as a closed stream.
fn replay(batch: Vec<Record>) -> mpsc::Receiver<Record> {
    let (tx, rx) = mpsc::channel(batch.len().max(1));
    for record in batch {
        // capacity covers the whole batch
        let _ = tx.try_send(record);
    }
    rx
}

/// Tag exceptional records on their way to the sink.
///
/// The handle resolves to the number of tagged records forwarded.
fn validate_stage(
    mut input: mpsc::Receiver<Record>,
    capacity: usize,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Record>, JoinHandle<usize>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(async move {
        let mut tagged = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                record = input.recv() => record,
            };
            let Some(record) = next else { break };

            let record = tag_exceptions(record);
            let is_tagged = record.is_exceptional();
            if let Some(tag) = record.error {
                log::debug!("Record {}/{} tagged: {}", record.source, record.id, tag);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = tx.send(record) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            if is_tagged {
                tagged += 1;
            }
        }
        tagged
    });
    (rx, handle)
}
