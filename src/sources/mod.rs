//! Message source capability.
//!
//! The pipeline only ever talks to a source through [`MessageSource`]; the
//! real messaging client lives outside this crate. [`ExportSource`] serves
//! histories from JSON exports for offline runs and tests.

pub mod export;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatId, RawMessage};

pub use export::{ChatExport, ExportSource};

/// Trait for message history backends.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Resolve a public channel name to a chat handle.
    async fn find_chat(&self, name: &str) -> Result<ChatId>;

    /// Fetch up to `limit` messages strictly older than `from_message_id`,
    /// newest first. A `from_message_id` of 0 starts at the newest message.
    async fn history_page(
        &self,
        chat: ChatId,
        from_message_id: i64,
        limit: usize,
    ) -> Result<Vec<RawMessage>>;

    /// Resolve the public permalink of a message.
    async fn message_link(&self, chat: ChatId, message_id: i64) -> Result<String>;
}
