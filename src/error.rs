// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Pattern automaton could not be compiled
    #[error("Matcher build error: {0}")]
    Matcher(#[from] aho_corasick::BuildError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// History retrieval failed for one source
    #[error("Fetch error for {source_id}: {message}")]
    Fetch { source_id: String, message: String },

    /// Permalink resolution failed for one message
    #[error("Link error for {source_id}/{message_id}: {message}")]
    Link {
        source_id: String,
        message_id: i64,
        message: String,
    },

    /// Persisting a batch failed
    #[error("Save error: {0}")]
    Save(String),

    /// Querying stored records failed
    #[error("Query error: {0}")]
    Query(String),

    /// Run stopped by a cancellation request before completing
    #[error("Run cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a source.
    pub fn fetch(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a link resolution error.
    pub fn link(source_id: impl Into<String>, message_id: i64, message: impl fmt::Display) -> Self {
        Self::Link {
            source_id: source_id.into(),
            message_id,
            message: message.to_string(),
        }
    }

    /// Create a save error.
    pub fn save(message: impl fmt::Display) -> Self {
        Self::Save(message.to_string())
    }

    /// Create a query error.
    pub fn query(message: impl fmt::Display) -> Self {
        Self::Query(message.to_string())
    }
}
