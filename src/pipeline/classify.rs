// src/pipeline/classify.rs

//! Worker pool running the classification engine over a record stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::ClassificationEngine;
use crate::models::{ErrorTag, Record};

/// Counters for one classification run.
#[derive(Debug, Default)]
pub struct ClassifyStats {
    classified: AtomicUsize,
    dropped: AtomicUsize,
    low_confidence: AtomicUsize,
}

/// Point-in-time copy of [`ClassifyStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifySnapshot {
    /// Records kept as errands
    pub classified: usize,
    /// Records that were not errands or came from an unknown source
    pub dropped: usize,
    /// Errands kept with the low-confidence tag
    pub low_confidence: usize,
}

impl ClassifyStats {
    pub fn snapshot(&self) -> ClassifySnapshot {
        ClassifySnapshot {
            classified: self.classified.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            low_confidence: self.low_confidence.load(Ordering::Relaxed),
        }
    }
}

impl ClassifySnapshot {
    pub(crate) fn absorb(&mut self, other: ClassifySnapshot) {
        self.classified += other.classified;
        self.dropped += other.dropped;
        self.low_confidence += other.low_confidence;
    }
}

/// A started classification stage.
pub struct ClassifyRun {
    pub records: mpsc::Receiver<Record>,
    pub stats: Arc<ClassifyStats>,
    pub handle: JoinHandle<()>,
}

/// Fixed pool of engine workers sharing one input stream.
#[derive(Clone)]
pub struct ClassificationPipeline {
    engine: ClassificationEngine,
    workers: usize,
    capacity: usize,
}

impl ClassificationPipeline {
    pub fn new(engine: ClassificationEngine, workers: usize, capacity: usize) -> Self {
        Self {
            engine,
            workers: workers.max(1),
            capacity: capacity.max(1),
        }
    }

    /// Spawn the workers over `input`.
    ///
    /// The output closes after every worker has drained the input or
    /// observed cancellation.
    pub fn start(&self, input: mpsc::Receiver<Record>, cancel: CancellationToken) -> ClassifyRun {
        let (tx, rx) = mpsc::channel(self.capacity);
        let input = Arc::new(Mutex::new(input));
        let stats = Arc::new(ClassifyStats::default());

        let workers: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(classify_worker(
                    id,
                    self.engine.clone(),
                    Arc::clone(&input),
                    tx.clone(),
                    cancel.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();
        drop(tx);

        let handle = tokio::spawn(async move {
            for result in join_all(workers).await {
                if let Err(e) = result {
                    log::error!("Classification worker panicked: {}", e);
                }
            }
        });

        ClassifyRun {
            records: rx,
            stats,
            handle,
        }
    }
}

async fn classify_worker(
    id: usize,
    engine: ClassificationEngine,
    input: Arc<Mutex<mpsc::Receiver<Record>>>,
    out: mpsc::Sender<Record>,
    cancel: CancellationToken,
    stats: Arc<ClassifyStats>,
) {
    let started = Instant::now();
    let mut matched = 0usize;
    let mut skipped = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = async { input.lock().await.recv().await } => record,
        };
        let Some(record) = next else { break };

        let Some(record) = engine.classify(record) else {
            skipped += 1;
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        };
        let low_confidence = record.error == Some(ErrorTag::MaybeErrand);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = out.send(record) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        matched += 1;
        stats.classified.fetch_add(1, Ordering::Relaxed);
        if low_confidence {
            stats.low_confidence.fetch_add(1, Ordering::Relaxed);
        }
    }

    log::debug!(
        "Classification worker {} completed: matched={}, skipped={}, duration={:?}",
        id,
        matched,
        skipped,
        started.elapsed()
    );
}
