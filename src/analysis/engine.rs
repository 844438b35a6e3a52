// src/analysis/engine.rs

//! Errand classification engine.
//!
//! The engine is stateless per record: the same record always classifies the
//! same way. It decides errand status according to the strategy configured
//! for the record's source, then attributes regions and the errand type using
//! the paragraph most dense in body markers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::analysis::Matchers;
use crate::models::{Classification, Config, ErrandStrategy, ErrorTag, Record};

/// Errand decision for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrandVerdict {
    NotErrand,
    /// Positive but provisional
    MaybeErrand,
    Errand,
}

/// Classifies records using shared, read-only matchers.
#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    matchers: Arc<Matchers>,
    strategies: Arc<HashMap<String, ErrandStrategy>>,
}

impl ClassificationEngine {
    pub fn new(matchers: Arc<Matchers>, strategies: HashMap<String, ErrandStrategy>) -> Self {
        Self {
            matchers,
            strategies: Arc::new(strategies),
        }
    }

    /// Engine using the strategies declared for the configured sources.
    pub fn from_config(matchers: Arc<Matchers>, config: &Config) -> Self {
        let strategies = config
            .sources
            .iter()
            .map(|s| (s.name.clone(), s.strategy))
            .collect();
        Self::new(matchers, strategies)
    }

    /// Classify a record, returning `None` when it is not an errand.
    pub fn classify(&self, record: Record) -> Option<Record> {
        let strategy = *self.strategies.get(&record.source)?;
        let error = match self.detect_errand(strategy, &record.text) {
            ErrandVerdict::NotErrand => return None,
            ErrandVerdict::MaybeErrand => Some(ErrorTag::MaybeErrand),
            ErrandVerdict::Errand => None,
        };

        let classification = Classification {
            regions: self.extract_regions(&record.text),
            errand_type: self.errand_type(&record.text),
            error,
        };
        Some(record.classified(classification))
    }

    /// Decide errand status with the given strategy.
    pub fn detect_errand(&self, strategy: ErrandStrategy, text: &str) -> ErrandVerdict {
        match strategy {
            ErrandStrategy::TripleVote => match self.title_votes(text) {
                3 => ErrandVerdict::Errand,
                2 => ErrandVerdict::MaybeErrand,
                _ => ErrandVerdict::NotErrand,
            },
            ErrandStrategy::PrefixOnly => {
                if self.matchers.prefix_only.is_match(text) {
                    ErrandVerdict::Errand
                } else {
                    ErrandVerdict::NotErrand
                }
            }
        }
    }

    /// Number of title matchers (prefix, verb, procedural) with a hit.
    pub fn title_votes(&self, text: &str) -> usize {
        let title = normalize_title(text);
        [
            &self.matchers.title_prefix,
            &self.matchers.verbs,
            &self.matchers.procedural,
        ]
        .iter()
        .filter(|set| set.is_match(&title))
        .count()
    }

    /// Paragraph (title excluded) with the strictly highest body-marker count.
    ///
    /// Falls back to the whole lowercased, trimmed text when no paragraph
    /// contains a marker.
    pub fn select_body(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut best_count = 0;
        let mut best = "";
        for paragraph in lowered.split('\n').skip(1) {
            let count = self.matchers.body_markers.count(paragraph);
            if count > best_count {
                best_count = count;
                best = paragraph;
            }
        }

        let body = best.trim();
        if body.is_empty() {
            lowered.trim().to_string()
        } else {
            body.to_string()
        }
    }

    /// Canonical regions attributed to an errand.
    pub fn extract_regions(&self, text: &str) -> Vec<String> {
        let body = self.select_body(text);
        let found = self.matchers.region_matches(&body);
        if !found.is_empty() {
            return self.apply_exceptions(self.matchers.canonical_regions(&found));
        }

        let found = self.matchers.region_matches(&text.to_lowercase());
        if found.len() > 1 {
            return Vec::new();
        }
        self.apply_exceptions(self.matchers.canonical_regions(&found))
    }

    /// Collapse the set to the first exception region it contains.
    ///
    /// Other regions found next to an exception are discarded.
    pub fn apply_exceptions(&self, regions: Vec<String>) -> Vec<String> {
        match regions.iter().find(|r| self.matchers.is_exception(r)) {
            Some(exception) => vec![exception.clone()],
            None => regions,
        }
    }

    /// Whether the selected body carries a special errand-type marker.
    pub fn errand_type(&self, text: &str) -> bool {
        let body = self.select_body(text);
        self.matchers.errand_types.is_match(&body)
    }
}

/// First line of `text`, lowercased, with whitespace runs collapsed.
pub fn normalize_title(text: &str) -> String {
    let title = text.split('\n').next().unwrap_or_default();
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
