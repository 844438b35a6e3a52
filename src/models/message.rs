// src/models/message.rs

//! Raw messages as delivered by a message source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle of a chat resolved by a message source.
pub type ChatId = i64;

/// Content shape of a raw message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text message
    Text { text: String },
    /// Photo attachment with an optional caption
    Photo {
        #[serde(default)]
        caption: String,
    },
    /// Video attachment with an optional caption
    Video {
        #[serde(default)]
        caption: String,
    },
    /// Anything the pipeline does not read (stickers, polls, documents...)
    Unsupported { kind: String },
}

impl MessageContent {
    /// Text carried by a supported content shape.
    ///
    /// Returns `None` for unsupported shapes; the returned text is not trimmed.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Photo { caption } | MessageContent::Video { caption } => Some(caption),
            MessageContent::Unsupported { .. } => None,
        }
    }

    /// Short name of the content shape, used in logs.
    pub fn kind(&self) -> &str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Photo { .. } => "photo",
            MessageContent::Video { .. } => "video",
            MessageContent::Unsupported { kind } => kind,
        }
    }
}

/// A message exactly as returned by a history page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMessage {
    /// Source-native message id
    pub id: i64,

    /// Unix timestamp in seconds
    pub date: i64,

    pub content: MessageContent,
}

impl RawMessage {
    /// Publication time, `None` if the timestamp is out of range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}
