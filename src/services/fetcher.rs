// src/services/fetcher.rs

//! Concurrent fan-out over every configured source.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{FetchConfig, Record, TimeWindow};
use crate::services::{EnrichmentWorkerPool, HistoryWalker};
use crate::sources::MessageSource;

/// Counters shared by every walker and enrichment worker of one fetch.
#[derive(Debug, Default)]
pub struct FetchStats {
    yielded: AtomicUsize,
    emitted: AtomicUsize,
    filtered: AtomicUsize,
    errors: AtomicUsize,
    source_failures: AtomicUsize,
}

/// Point-in-time copy of [`FetchStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchSnapshot {
    pub yielded: usize,
    pub emitted: usize,
    pub filtered: usize,
    pub errors: usize,
    pub source_failures: usize,
}

impl FetchStats {
    pub(crate) fn record_yielded(&self) {
        self.yielded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_source_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        FetchSnapshot {
            yielded: self.yielded.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
        }
    }
}

impl FetchSnapshot {
    /// Records handed to the classification stage.
    pub fn forwarded(&self) -> usize {
        self.emitted + self.errors
    }

    /// Whether every yielded message was accounted for.
    pub fn is_balanced(&self) -> bool {
        self.emitted + self.filtered + self.errors == self.yielded
    }

    pub(crate) fn absorb(&mut self, other: FetchSnapshot) {
        self.yielded += other.yielded;
        self.emitted += other.emitted;
        self.filtered += other.filtered;
        self.errors += other.errors;
        self.source_failures += other.source_failures;
    }
}

/// A started fetch: the merged record stream plus its bookkeeping.
pub struct FetchRun {
    pub records: mpsc::Receiver<Record>,
    pub stats: Arc<FetchStats>,
    /// Completes once every source has finished or been cancelled
    pub handle: JoinHandle<()>,
}

/// Runs one walker and one enrichment pool per source.
pub struct FetchCoordinator {
    source: Arc<dyn MessageSource>,
    sources: Vec<String>,
    config: FetchConfig,
}

impl FetchCoordinator {
    pub fn new(source: Arc<dyn MessageSource>, sources: Vec<String>, config: FetchConfig) -> Self {
        Self {
            source,
            sources,
            config,
        }
    }

    /// Start fetching `window` from every source.
    ///
    /// The record stream closes once all sources are done.
    pub fn start(&self, window: TimeWindow, cancel: CancellationToken) -> FetchRun {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let stats = Arc::new(FetchStats::default());

        log::info!(
            "Fetching {} source(s) in window {}",
            self.sources.len(),
            window
        );

        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|name| {
                tokio::spawn(fetch_source(
                    Arc::clone(&self.source),
                    name.clone(),
                    window,
                    self.config.clone(),
                    tx.clone(),
                    cancel.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();
        drop(tx);

        let done = Arc::clone(&stats);
        let handle = tokio::spawn(async move {
            for result in join_all(tasks).await {
                if let Err(e) = result {
                    log::error!("Source task panicked: {}", e);
                }
            }
            let snapshot = done.snapshot();
            log::info!(
                "Fetch finished: yielded={}, emitted={}, filtered={}, errors={}, source_failures={}",
                snapshot.yielded,
                snapshot.emitted,
                snapshot.filtered,
                snapshot.errors,
                snapshot.source_failures
            );
        });

        FetchRun {
            records: rx,
            stats,
            handle,
        }
    }
}

async fn fetch_source(
    source: Arc<dyn MessageSource>,
    name: String,
    window: TimeWindow,
    config: FetchConfig,
    out: mpsc::Sender<Record>,
    cancel: CancellationToken,
    stats: Arc<FetchStats>,
) {
    let chat = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        chat = source.find_chat(&name) => chat,
    };
    let chat = match chat {
        Ok(chat) => chat,
        Err(e) => {
            log::error!("Failed to resolve {}: {}", name, e);
            stats.record_source_failure();
            return;
        }
    };
    log::info!("Fetching {} (chat {})", name, chat);

    let (raw_tx, raw_rx) = mpsc::channel(config.channel_capacity.max(1));
    let walker = HistoryWalker::new(
        Arc::clone(&source),
        name.clone(),
        chat,
        window,
        config.page_size,
    );
    let pool = EnrichmentWorkerPool::new(
        source,
        name.clone(),
        chat,
        config.enrich_workers,
        Arc::clone(&stats),
    );

    let walk = tokio::spawn(walker.walk(raw_tx, cancel.clone(), Arc::clone(&stats)));
    pool.run(raw_rx, out, cancel).await;

    match walk.await {
        Ok(Ok(summary)) => log::info!(
            "Finished {}: pages={}, yielded={}, skipped_newer={}, reached_start={}, cancelled={}",
            name,
            summary.pages,
            summary.yielded,
            summary.skipped_newer,
            summary.reached_lower_bound,
            summary.cancelled
        ),
        Ok(Err(e)) => {
            log::error!("{}", e);
            stats.record_source_failure();
        }
        Err(e) => {
            log::error!("History walker for {} panicked: {}", name, e);
            stats.record_source_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::{ChatId, MessageContent, RawMessage};
    use crate::sources::{ChatExport, ExportSource};

    fn window() -> TimeWindow {
        TimeWindow::new(
            DateTime::from_timestamp(0, 0).unwrap(),
            DateTime::from_timestamp(10_000, 0).unwrap(),
        )
        .unwrap()
    }

    fn text(id: i64) -> RawMessage {
        RawMessage {
            id,
            date: id * 10,
            content: MessageContent::Text {
                text: format!("message {id}"),
            },
        }
    }

    fn export(chat_id: ChatId, username: &str, messages: Vec<RawMessage>) -> ChatExport {
        ChatExport {
            chat_id,
            username: username.to_string(),
            messages,
        }
    }

    fn config() -> FetchConfig {
        FetchConfig {
            page_size: 4,
            enrich_workers: 3,
            channel_capacity: 1,
        }
    }

    async fn drain(run: FetchRun) -> (Vec<Record>, FetchSnapshot) {
        let FetchRun {
            mut records,
            stats,
            handle,
        } = run;
        let mut out = Vec::new();
        while let Some(record) = records.recv().await {
            out.push(record);
        }
        handle.await.unwrap();
        (out, stats.snapshot())
    }

    #[tokio::test]
    async fn test_merges_all_sources_and_balances() {
        let mut press = (1..=10).map(text).collect::<Vec<_>>();
        press.push(RawMessage {
            id: 11,
            date: 110,
            content: MessageContent::Unsupported {
                kind: "sticker".to_string(),
            },
        });
        let source = Arc::new(ExportSource::new([
            ("a".to_string(), export(1, "a", press)),
            ("b".to_string(), export(2, "", (1..=5).map(text).collect())),
        ]));
        let coordinator = FetchCoordinator::new(
            source,
            vec!["a".to_string(), "b".to_string()],
            config(),
        );

        let (records, snapshot) = drain(coordinator.start(window(), CancellationToken::new())).await;

        assert_eq!(records.len(), 15);
        assert_eq!(snapshot.yielded, 16);
        assert_eq!(snapshot.emitted, 10);
        assert_eq!(snapshot.filtered, 1);
        assert_eq!(snapshot.errors, 5);
        assert!(snapshot.is_balanced());
        assert!(records.iter().filter(|r| r.source == "b").all(|r| r.link.is_empty()));
    }

    /// Resolves chats but fails every history page.
    struct BrokenHistory;

    #[async_trait]
    impl MessageSource for BrokenHistory {
        async fn find_chat(&self, name: &str) -> Result<ChatId> {
            match name {
                "missing" => Err(AppError::fetch(name, "chat not found")),
                _ => Ok(1),
            }
        }

        async fn history_page(&self, _chat: ChatId, _from: i64, _limit: usize) -> Result<Vec<RawMessage>> {
            Err(AppError::fetch("broken", "timeout"))
        }

        async fn message_link(&self, _chat: ChatId, _id: i64) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_failing_sources_are_counted() {
        let coordinator = FetchCoordinator::new(
            Arc::new(BrokenHistory),
            vec!["missing".to_string(), "broken".to_string()],
            config(),
        );

        let (records, snapshot) = drain(coordinator.start(window(), CancellationToken::new())).await;

        assert!(records.is_empty());
        assert_eq!(snapshot.source_failures, 2);
        assert_eq!(snapshot.yielded, 0);
    }

    #[tokio::test]
    async fn test_unknown_source_does_not_abort_others() {
        let source = Arc::new(ExportSource::new([(
            "a".to_string(),
            export(1, "a", (1..=3).map(text).collect()),
        )]));
        let coordinator = FetchCoordinator::new(
            source,
            vec!["a".to_string(), "ghost".to_string()],
            config(),
        );

        let (records, snapshot) = drain(coordinator.start(window(), CancellationToken::new())).await;

        assert_eq!(records.len(), 3);
        assert_eq!(snapshot.source_failures, 1);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_closes_stream() {
        let source = Arc::new(ExportSource::new([(
            "a".to_string(),
            export(1, "a", (1..=500).map(text).collect()),
        )]));
        let coordinator = FetchCoordinator::new(source, vec!["a".to_string()], config());
        let cancel = CancellationToken::new();
        let FetchRun {
            mut records,
            stats,
            handle,
        } = coordinator.start(window(), cancel.clone());

        assert!(records.recv().await.is_some());
        cancel.cancel();
        handle.await.unwrap();

        let mut leftover = 0;
        while records.recv().await.is_some() {
            leftover += 1;
        }
        assert!(leftover <= 1);
        assert!(stats.snapshot().yielded < 500);
    }
}
