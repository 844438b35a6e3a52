// src/services/enrich.rs

//! Worker pool turning raw messages into records with permalinks.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::models::{ChatId, RawMessage, Record};
use crate::services::FetchStats;
use crate::sources::MessageSource;

/// Convert a raw message into a record for `source`.
///
/// Returns `None` for content without text, blank text or an invalid date.
pub fn normalize_message(raw: &RawMessage, source: &str) -> Option<Record> {
    let Some(text) = raw.content.text() else {
        log::warn!(
            "Skipping {} message {} in {}",
            raw.content.kind(),
            raw.id,
            source
        );
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let timestamp = raw.timestamp()?;
    Some(Record::new(raw.id, text, timestamp).with_source(source))
}

/// Fixed-size pool of workers sharing one input stream.
pub struct EnrichmentWorkerPool {
    source: Arc<dyn MessageSource>,
    name: String,
    chat: ChatId,
    workers: usize,
    stats: Arc<FetchStats>,
}

impl EnrichmentWorkerPool {
    pub fn new(
        source: Arc<dyn MessageSource>,
        name: impl Into<String>,
        chat: ChatId,
        workers: usize,
        stats: Arc<FetchStats>,
    ) -> Self {
        Self {
            source,
            name: name.into(),
            chat,
            workers: workers.max(1),
            stats,
        }
    }

    /// Run every worker to completion.
    ///
    /// Returns once the input is drained or cancellation is observed; `out`
    /// is released by each worker as it stops.
    pub async fn run(
        self,
        input: mpsc::Receiver<RawMessage>,
        out: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) {
        let input = Arc::new(Mutex::new(input));
        let pool = Arc::new(self);

        let handles: Vec<_> = (0..pool.workers)
            .map(|id| {
                let pool = Arc::clone(&pool);
                let input = Arc::clone(&input);
                let out = out.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { pool.worker(id, input, out, cancel).await })
            })
            .collect();
        drop(out);

        for result in join_all(handles).await {
            if let Err(e) = result {
                log::error!("Enrichment worker for {} panicked: {}", pool.name, e);
            }
        }
        log::debug!("All enrichment workers finished for {}", pool.name);
    }

    async fn worker(
        &self,
        id: usize,
        input: Arc<Mutex<mpsc::Receiver<RawMessage>>>,
        out: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) {
        let started = Instant::now();
        let mut forwarded = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                raw = async { input.lock().await.recv().await } => raw,
            };
            let Some(raw) = next else { break };

            let Some(record) = normalize_message(&raw, &self.name) else {
                self.stats.record_filtered();
                continue;
            };

            let link = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                link = self.source.message_link(self.chat, record.id) => link,
            };
            let (record, resolved) = match link {
                Ok(link) => (record.with_link(link), true),
                Err(e) => {
                    log::warn!("{}", e);
                    (record, false)
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = out.send(record) => {
                    if sent.is_err() {
                        log::debug!("Record stream for {} closed downstream", self.name);
                        break;
                    }
                }
            }
            if resolved {
                self.stats.record_emitted();
            } else {
                self.stats.record_error();
            }
            forwarded += 1;
        }

        log::debug!(
            "Enrichment worker {} for {} stopped: forwarded={}, duration={:?}",
            id,
            self.name,
            forwarded,
            started.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageContent;
    use crate::sources::{ChatExport, ExportSource};

    fn raw(id: i64, content: MessageContent) -> RawMessage {
        RawMessage {
            id,
            date: 1_700_000_000 + id,
            content,
        }
    }

    fn text(id: i64, body: &str) -> RawMessage {
        raw(
            id,
            MessageContent::Text {
                text: body.to_string(),
            },
        )
    }

    #[test]
    fn test_normalize_message() {
        let record = normalize_message(&text(5, "  hello  "), "press").unwrap();
        assert_eq!(record.id, 5);
        assert_eq!(record.text, "hello");
        assert_eq!(record.source, "press");
        assert!(!record.errand);

        let photo = raw(
            6,
            MessageContent::Photo {
                caption: "caption".to_string(),
            },
        );
        assert_eq!(normalize_message(&photo, "press").unwrap().text, "caption");

        let sticker = raw(
            7,
            MessageContent::Unsupported {
                kind: "sticker".to_string(),
            },
        );
        assert!(normalize_message(&sticker, "press").is_none());
        assert!(normalize_message(&text(8, "   "), "press").is_none());
    }

    async fn run_pool(username: &str, messages: Vec<RawMessage>) -> (Vec<Record>, Arc<FetchStats>) {
        let source: Arc<dyn MessageSource> = Arc::new(ExportSource::new([(
            "press".to_string(),
            ChatExport {
                chat_id: 9,
                username: username.to_string(),
                messages: messages.clone(),
            },
        )]));
        let stats = Arc::new(FetchStats::default());
        let pool = EnrichmentWorkerPool::new(source, "press", 9, 3, Arc::clone(&stats));

        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let handle = tokio::spawn(pool.run(in_rx, out_tx, CancellationToken::new()));

        tokio::spawn(async move {
            for message in messages {
                if in_tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        let mut records = Vec::new();
        while let Some(record) = out_rx.recv().await {
            records.push(record);
        }
        handle.await.unwrap();
        records.sort_by_key(|r| r.id);
        (records, stats)
    }

    #[tokio::test]
    async fn test_pool_resolves_links_and_filters() {
        let messages = vec![
            text(1, "first"),
            raw(
                2,
                MessageContent::Unsupported {
                    kind: "poll".to_string(),
                },
            ),
            text(3, "third"),
        ];
        let (records, stats) = run_pool("press", messages).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].link, "https://t.me/press/1");
        assert_eq!(records[1].link, "https://t.me/press/3");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.emitted, 2);
        assert_eq!(snapshot.filtered, 1);
        assert_eq!(snapshot.errors, 0);
    }

    #[tokio::test]
    async fn test_link_failure_still_forwards_record() {
        let (records, stats) = run_pool("", vec![text(1, "first"), text(2, "second")]).await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.link.is_empty()));
        assert_eq!(stats.snapshot().errors, 2);
        assert_eq!(stats.snapshot().emitted, 0);
    }

    #[tokio::test]
    async fn test_pool_stops_on_cancellation() {
        let source: Arc<dyn MessageSource> = Arc::new(ExportSource::default());
        let pool = EnrichmentWorkerPool::new(source, "press", 9, 2, Arc::new(FetchStats::default()));
        let (_in_tx, in_rx) = mpsc::channel::<RawMessage>(1);
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(pool.run(in_rx, out_tx, cancel.clone()));
        cancel.cancel();
        handle.await.unwrap();

        assert!(out_rx.recv().await.is_none());
    }
}
