// src/models/source.rs

//! Named sources and their errand-detection strategy.

use serde::{Deserialize, Serialize};

/// How a source's messages are recognized as errands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrandStrategy {
    /// Title is voted on by prefix, verb and procedural-code markers
    TripleVote,
    /// Any prefix marker in the full text
    PrefixOnly,
}

/// A source to fetch from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Public name of the channel
    pub name: String,

    /// Errand-detection strategy for this channel
    pub strategy: ErrandStrategy,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, strategy: ErrandStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }
}
