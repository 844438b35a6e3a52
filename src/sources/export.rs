// src/sources/export.rs

//! Message source backed by JSON history exports.
//!
//! ## Layout
//!
//! ```text
//! {export_dir}/
//! ├── sledcom_press.json
//! └── infocentrskrf.json
//! ```
//!
//! Each file holds one [`ChatExport`].

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ChatId, RawMessage};
use crate::sources::MessageSource;

/// Exported history of one chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExport {
    pub chat_id: ChatId,

    /// Public username used in permalinks; empty for private chats
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Serves history pages and permalinks from in-memory exports.
#[derive(Debug, Default)]
pub struct ExportSource {
    chats: HashMap<String, ChatExport>,
    names: HashMap<ChatId, String>,
}

impl ExportSource {
    /// Build a source from `(channel name, export)` pairs.
    pub fn new(exports: impl IntoIterator<Item = (String, ChatExport)>) -> Self {
        let mut chats = HashMap::new();
        let mut names = HashMap::new();
        for (name, mut export) in exports {
            export.messages.sort_by(|a, b| b.id.cmp(&a.id));
            names.insert(export.chat_id, name.clone());
            chats.insert(name, export);
        }
        Self { chats, names }
    }

    /// Load `{dir}/{name}.json` for every name. Missing files are skipped.
    pub fn load_dir(dir: impl AsRef<Path>, names: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut exports = Vec::new();
        for name in names {
            let path = dir.join(format!("{name}.json"));
            if !path.exists() {
                log::warn!("No export for {} at {}", name, path.display());
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let export: ChatExport = serde_json::from_str(&content)?;
            log::debug!(
                "Loaded {} messages for {} from {}",
                export.messages.len(),
                name,
                path.display()
            );
            exports.push((name.clone(), export));
        }
        Ok(Self::new(exports))
    }

    fn chat(&self, chat: ChatId) -> Option<(&str, &ChatExport)> {
        let name = self.names.get(&chat)?;
        self.chats.get(name).map(|export| (name.as_str(), export))
    }
}

#[async_trait]
impl MessageSource for ExportSource {
    async fn find_chat(&self, name: &str) -> Result<ChatId> {
        self.chats
            .get(name)
            .map(|export| export.chat_id)
            .ok_or_else(|| AppError::fetch(name, "chat not found"))
    }

    async fn history_page(
        &self,
        chat: ChatId,
        from_message_id: i64,
        limit: usize,
    ) -> Result<Vec<RawMessage>> {
        let (_, export) = self
            .chat(chat)
            .ok_or_else(|| AppError::fetch(chat.to_string(), "unknown chat id"))?;

        Ok(export
            .messages
            .iter()
            .filter(|m| from_message_id == 0 || m.id < from_message_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn message_link(&self, chat: ChatId, message_id: i64) -> Result<String> {
        let (name, export) = self
            .chat(chat)
            .ok_or_else(|| AppError::link(chat.to_string(), message_id, "unknown chat id"))?;

        if export.username.is_empty() {
            return Err(AppError::link(name, message_id, "chat has no public username"));
        }
        if !export.messages.iter().any(|m| m.id == message_id) {
            return Err(AppError::link(name, message_id, "message not found"));
        }
        Ok(format!("https://t.me/{}/{}", export.username, message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageContent;

    fn text_message(id: i64, date: i64) -> RawMessage {
        RawMessage {
            id,
            date,
            content: MessageContent::Text {
                text: format!("message {id}"),
            },
        }
    }

    fn source() -> ExportSource {
        ExportSource::new([(
            "press".to_string(),
            ChatExport {
                chat_id: 77,
                username: "press".to_string(),
                messages: (1..=5).map(|id| text_message(id, id * 100)).collect(),
            },
        )])
    }

    #[tokio::test]
    async fn test_pages_newest_first() {
        let source = source();
        let chat = source.find_chat("press").await.unwrap();

        let first = source.history_page(chat, 0, 2).await.unwrap();
        assert_eq!(first.iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 4]);

        let second = source.history_page(chat, 4, 2).await.unwrap();
        assert_eq!(second.iter().map(|m| m.id).collect::<Vec<_>>(), vec![3, 2]);

        let last = source.history_page(chat, 1, 2).await.unwrap();
        assert!(last.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_chat_is_fetch_error() {
        let source = source();
        assert!(matches!(
            source.find_chat("nope").await,
            Err(AppError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn test_message_link() {
        let source = source();
        assert_eq!(
            source.message_link(77, 3).await.unwrap(),
            "https://t.me/press/3"
        );
        assert!(matches!(
            source.message_link(77, 99).await,
            Err(AppError::Link { .. })
        ));
    }

    #[test]
    fn test_load_dir_skips_missing_exports() {
        let tmp = tempfile::TempDir::new().unwrap();
        let export = ChatExport {
            chat_id: 1,
            username: "a".to_string(),
            messages: vec![text_message(1, 100)],
        };
        std::fs::write(
            tmp.path().join("a.json"),
            serde_json::to_string(&export).unwrap(),
        )
        .unwrap();

        let source =
            ExportSource::load_dir(tmp.path(), &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(source.chats.len(), 1);
    }
}
