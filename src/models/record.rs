// src/models/record.rs

//! The record flowing through the fetch and classification pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marks a record as exceptional without failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorTag {
    /// Only two of the three title votes matched
    #[serde(rename = "maybe errand")]
    MaybeErrand,
    /// No region could be attributed
    #[serde(rename = "no region found")]
    NoRegion,
    /// Text turned out blank after extraction
    #[serde(rename = "empty text")]
    EmptyText,
    /// Several regions on a special-type errand
    #[serde(rename = "ambiguous: multiple regions with special errand type")]
    AmbiguousRegions,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::MaybeErrand => "maybe errand",
            ErrorTag::NoRegion => "no region found",
            ErrorTag::EmptyText => "empty text",
            ErrorTag::AmbiguousRegions => "ambiguous: multiple regions with special errand type",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one record as an errand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Canonical region names
    pub regions: Vec<String>,
    /// Special errand type detected in the body
    pub errand_type: bool,
    /// Low-confidence marker or other tag set during classification
    pub error: Option<ErrorTag>,
}

/// A normalized message, classified once it leaves the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Source-native message id (unique per source)
    pub id: i64,

    /// Permalink, empty when resolution failed
    #[serde(default)]
    pub link: String,

    /// Trimmed message text
    pub text: String,

    /// Publication time
    pub timestamp: DateTime<Utc>,

    /// Name of the source that produced the message
    pub source: String,

    /// Canonical region names
    #[serde(default)]
    pub regions: Vec<String>,

    /// Classified as an errand
    #[serde(default)]
    pub errand: bool,

    /// Special errand type
    #[serde(default)]
    pub errand_type: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorTag>,
}

impl Record {
    /// Create an unclassified record.
    pub fn new(id: i64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            link: String::new(),
            text: text.into(),
            timestamp,
            source: String::new(),
            regions: Vec::new(),
            errand: false,
            errand_type: false,
            error: None,
        }
    }

    /// Attach the source name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Attach the resolved permalink.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Consume the unclassified record and return it classified as an errand.
    pub fn classified(self, classification: Classification) -> Self {
        Self {
            regions: classification.regions,
            errand: true,
            errand_type: classification.errand_type,
            error: classification.error,
            ..self
        }
    }

    /// Set a tag unless one is already present.
    pub fn tag(&mut self, tag: ErrorTag) {
        if self.error.is_none() {
            self.error = Some(tag);
        }
    }

    /// Whether the record carries an exceptional tag.
    pub fn is_exceptional(&self) -> bool {
        self.error.is_some()
    }
}
