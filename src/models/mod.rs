// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod message;
mod record;
mod source;
mod window;

// Re-export all public types
pub use config::{ClassifyConfig, Config, FetchConfig, LoggingConfig, PathsConfig};
pub use message::{ChatId, MessageContent, RawMessage};
pub use record::{Classification, ErrorTag, Record};
pub use source::{ErrandStrategy, SourceConfig};
pub use window::TimeWindow;
