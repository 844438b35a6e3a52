// src/services/history.rs

//! Backward history pager for a single source.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ChatId, RawMessage, TimeWindow};
use crate::services::FetchStats;
use crate::sources::MessageSource;

/// Summary of one history walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    /// Messages handed downstream
    pub yielded: usize,
    /// Messages newer than the window
    pub skipped_newer: usize,
    pub reached_lower_bound: bool,
    pub cancelled: bool,
}

/// Pages backward through one chat until the window's lower bound is crossed.
pub struct HistoryWalker {
    source: Arc<dyn MessageSource>,
    name: String,
    chat: ChatId,
    window: TimeWindow,
    page_size: usize,
    /// Id of the oldest message seen so far, `None` before the first page
    cursor: Option<i64>,
    reached_lower_bound: bool,
}

impl HistoryWalker {
    pub fn new(
        source: Arc<dyn MessageSource>,
        name: impl Into<String>,
        chat: ChatId,
        window: TimeWindow,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            name: name.into(),
            chat,
            window,
            page_size: page_size.max(1),
            cursor: None,
            reached_lower_bound: false,
        }
    }

    /// Walk the history, sending in-window messages to `out`.
    ///
    /// Messages are sent in the order the pages deliver them (newest first).
    /// A retrieval failure ends the walk with [`AppError::Fetch`].
    pub async fn walk(
        mut self,
        out: mpsc::Sender<RawMessage>,
        cancel: CancellationToken,
        stats: Arc<FetchStats>,
    ) -> Result<WalkSummary> {
        let mut summary = WalkSummary::default();
        log::info!(
            "History walk started for {} in window {}",
            self.name,
            self.window
        );

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::warn!("History walk cancelled for {}", self.name);
                    summary.cancelled = true;
                    return Ok(summary);
                }
                // a cursor of 0 asks the source for the newest page
                page = self.source.history_page(self.chat, self.cursor.unwrap_or(0), self.page_size) => page,
            };
            let page = page.map_err(|e| {
                log::error!("History page failed for {} (chat {}): {}", self.name, self.chat, e);
                AppError::fetch(&self.name, e)
            })?;
            summary.pages += 1;

            let Some(oldest) = page.last().map(|m| m.id) else {
                log::info!("Reached end of history for {}", self.name);
                break;
            };

            for message in page {
                let Some(timestamp) = message.timestamp() else {
                    log::warn!(
                        "Message {} in {} has an invalid date {}",
                        message.id,
                        self.name,
                        message.date
                    );
                    continue;
                };
                if self.window.is_after(timestamp) {
                    summary.skipped_newer += 1;
                    continue;
                }
                if self.window.is_before(timestamp) {
                    self.reached_lower_bound = true;
                    break;
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        log::warn!("History walk cancelled while sending for {}", self.name);
                        summary.cancelled = true;
                        return Ok(summary);
                    }
                    sent = out.send(message) => {
                        if sent.is_err() {
                            log::debug!("Enrichment pool for {} closed its input", self.name);
                            summary.cancelled = true;
                            return Ok(summary);
                        }
                    }
                }
                summary.yielded += 1;
                stats.record_yielded();
            }

            if self.reached_lower_bound {
                log::info!("Reached window start for {}", self.name);
                break;
            }
            if let Some(cursor) = self.cursor {
                if oldest >= cursor {
                    log::warn!(
                        "History cursor for {} did not advance past {}, stopping",
                        self.name,
                        cursor
                    );
                    break;
                }
            }
            if oldest <= 0 {
                log::info!("Reached message id {} for {}, stopping", oldest, self.name);
                break;
            }
            self.cursor = Some(oldest);
        }

        summary.reached_lower_bound = self.reached_lower_bound;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::models::MessageContent;
    use crate::sources::{ChatExport, ExportSource};

    fn message(id: i64, date: i64) -> RawMessage {
        RawMessage {
            id,
            date,
            content: MessageContent::Text {
                text: format!("message {id}"),
            },
        }
    }

    fn window(from: i64, to: i64) -> TimeWindow {
        TimeWindow::new(
            DateTime::from_timestamp(from, 0).unwrap(),
            DateTime::from_timestamp(to, 0).unwrap(),
        )
        .unwrap()
    }

    /// Ids 1..=20 dated `id * 100`.
    fn export_source() -> Arc<dyn MessageSource> {
        Arc::new(ExportSource::new([(
            "press".to_string(),
            ChatExport {
                chat_id: 1,
                username: "press".to_string(),
                messages: (1..=20).map(|id| message(id, id * 100)).collect(),
            },
        )]))
    }

    async fn collect(walker: HistoryWalker) -> (Result<WalkSummary>, Vec<i64>) {
        let (tx, mut rx) = mpsc::channel(1);
        let stats = Arc::new(FetchStats::default());
        let handle = tokio::spawn(walker.walk(tx, CancellationToken::new(), stats));
        let mut ids = Vec::new();
        while let Some(message) = rx.recv().await {
            ids.push(message.id);
        }
        (handle.await.unwrap(), ids)
    }

    #[tokio::test]
    async fn test_walk_emits_window_newest_first() {
        let walker = HistoryWalker::new(export_source(), "press", 1, window(500, 1200), 3);
        let (summary, ids) = collect(walker).await;
        let summary = summary.unwrap();

        assert_eq!(ids, vec![12, 11, 10, 9, 8, 7, 6, 5]);
        assert_eq!(summary.skipped_newer, 8);
        assert_eq!(summary.yielded, 8);
        assert!(summary.reached_lower_bound);
    }

    #[tokio::test]
    async fn test_walk_ends_on_empty_page() {
        let walker = HistoryWalker::new(export_source(), "press", 1, window(0, 5000), 50);
        let (summary, ids) = collect(walker).await;
        let summary = summary.unwrap();

        assert_eq!(ids.len(), 20);
        assert_eq!(summary.pages, 2);
        assert!(!summary.reached_lower_bound);
    }

    /// Scripted pages, optionally failing after the scripted ones run out.
    struct ScriptedSource {
        pages: Mutex<Vec<Vec<RawMessage>>>,
        fail_when_exhausted: bool,
        calls: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn find_chat(&self, _name: &str) -> Result<ChatId> {
            Ok(1)
        }

        async fn history_page(
            &self,
            _chat: ChatId,
            from_message_id: i64,
            _limit: usize,
        ) -> Result<Vec<RawMessage>> {
            self.calls.lock().unwrap().push(from_message_id);
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                if self.fail_when_exhausted {
                    return Err(AppError::fetch("scripted", "connection reset"));
                }
                return Ok(Vec::new());
            }
            Ok(pages.remove(0))
        }

        async fn message_link(&self, _chat: ChatId, message_id: i64) -> Result<String> {
            Ok(format!("link/{message_id}"))
        }
    }

    #[tokio::test]
    async fn test_walk_uses_oldest_id_as_cursor() {
        let source = Arc::new(ScriptedSource {
            pages: Mutex::new(vec![
                vec![message(30, 3000), message(29, 2900)],
                vec![message(25, 2500)],
            ]),
            fail_when_exhausted: false,
            calls: Mutex::new(Vec::new()),
        });
        let walker = HistoryWalker::new(source.clone(), "scripted", 1, window(0, 5000), 2);
        let (summary, ids) = collect(walker).await;

        assert!(summary.is_ok());
        assert_eq!(ids, vec![30, 29, 25]);
        assert_eq!(*source.calls.lock().unwrap(), vec![0, 29, 25]);
    }

    #[tokio::test]
    async fn test_walk_failure_is_fetch_error() {
        let source = Arc::new(ScriptedSource {
            pages: Mutex::new(vec![vec![message(30, 3000)]]),
            fail_when_exhausted: true,
            calls: Mutex::new(Vec::new()),
        });
        let walker = HistoryWalker::new(source, "scripted", 1, window(0, 5000), 2);
        let (summary, ids) = collect(walker).await;

        assert_eq!(ids, vec![30]);
        assert!(matches!(summary, Err(AppError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_walk_stops_on_non_advancing_cursor() {
        let source = Arc::new(ScriptedSource {
            pages: Mutex::new(vec![
                vec![message(30, 3000)],
                vec![message(30, 3000)],
                vec![message(10, 1000)],
            ]),
            fail_when_exhausted: false,
            calls: Mutex::new(Vec::new()),
        });
        let walker = HistoryWalker::new(source, "scripted", 1, window(0, 5000), 1);
        let (summary, ids) = collect(walker).await;

        assert_eq!(summary.unwrap().pages, 2);
        assert_eq!(ids, vec![30, 30]);
    }

    #[tokio::test]
    async fn test_walk_stops_at_message_id_zero() {
        let source: Arc<dyn MessageSource> = Arc::new(ExportSource::new([(
            "press".to_string(),
            ChatExport {
                chat_id: 1,
                username: "press".to_string(),
                messages: vec![message(0, 100)],
            },
        )]));
        let walker = HistoryWalker::new(source, "press", 1, window(0, 1000), 50);
        let (summary, ids) =
            tokio::time::timeout(std::time::Duration::from_secs(2), collect(walker))
                .await
                .unwrap();

        assert_eq!(ids, vec![0]);
        assert_eq!(summary.unwrap().pages, 1);
    }

    #[tokio::test]
    async fn test_walk_observes_cancellation() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let walker = HistoryWalker::new(export_source(), "press", 1, window(0, 5000), 5);
        let handle = tokio::spawn(walker.walk(
            tx,
            cancel.clone(),
            Arc::new(FetchStats::default()),
        ));

        assert_eq!(rx.recv().await.map(|m| m.id), Some(20));
        cancel.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert!(summary.cancelled);
        // at most the one message already buffered in the channel remains
        let mut leftover = 0;
        while rx.recv().await.is_some() {
            leftover += 1;
        }
        assert!(leftover <= 1);
        assert!(summary.yielded <= 2);
    }
}
