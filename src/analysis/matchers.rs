// src/analysis/matchers.rs

//! Compiled multi-pattern matchers built from the dictionaries.
//!
//! Matching is overlapping and reports every dictionary pattern at most once
//! per haystack, so "number of matches" always means "number of distinct
//! patterns found".

use std::collections::HashSet;

use aho_corasick::AhoCorasick;

use crate::analysis::Dictionaries;
use crate::error::Result;

/// One compiled dictionary group.
#[derive(Debug, Clone)]
pub struct PatternSet {
    automaton: AhoCorasick,
}

impl PatternSet {
    pub fn new<P: AsRef<[u8]>>(patterns: &[P]) -> Result<Self> {
        Ok(Self {
            automaton: AhoCorasick::new(patterns)?,
        })
    }

    /// Distinct pattern indices found in `haystack`, in order of first match.
    pub fn matches(&self, haystack: &str) -> Vec<usize> {
        let mut seen = vec![false; self.automaton.patterns_len()];
        let mut found = Vec::new();
        for mat in self.automaton.find_overlapping_iter(haystack) {
            let idx = mat.pattern().as_usize();
            if !seen[idx] {
                seen[idx] = true;
                found.push(idx);
            }
        }
        found
    }

    /// Number of distinct patterns found in `haystack`.
    pub fn count(&self, haystack: &str) -> usize {
        self.matches(haystack).len()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.automaton.is_match(haystack)
    }
}

/// All matchers used by the classification engine.
///
/// Built once at startup and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct Matchers {
    pub title_prefix: PatternSet,
    pub verbs: PatternSet,
    pub procedural: PatternSet,
    pub prefix_only: PatternSet,
    pub body_markers: PatternSet,
    pub errand_types: PatternSet,
    regions: PatternSet,
    /// Canonical name for every region pattern index
    region_canonical: Vec<String>,
    exceptions: HashSet<String>,
}

impl Matchers {
    /// Compile every dictionary group.
    pub fn build(dict: &Dictionaries) -> Result<Self> {
        let (aliases, canonical): (Vec<&str>, Vec<String>) = dict
            .regions
            .iter()
            .map(|(alias, name)| (alias.as_str(), name.clone()))
            .unzip();

        Ok(Self {
            title_prefix: PatternSet::new(&dict.title_prefixes)?,
            verbs: PatternSet::new(&dict.verbs)?,
            procedural: PatternSet::new(&dict.procedural_codes)?,
            prefix_only: PatternSet::new(&dict.prefix_only)?,
            body_markers: PatternSet::new(&dict.body_markers)?,
            errand_types: PatternSet::new(&dict.errand_types)?,
            regions: PatternSet::new(&aliases)?,
            region_canonical: canonical,
            exceptions: dict.exceptions.iter().cloned().collect(),
        })
    }

    /// Distinct region aliases found in `haystack`.
    pub fn region_matches(&self, haystack: &str) -> Vec<usize> {
        self.regions.matches(haystack)
    }

    /// Map alias indices to canonical names, deduplicated in first-seen order.
    pub fn canonical_regions(&self, matches: &[usize]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut regions = Vec::new();
        for &idx in matches {
            if let Some(name) = self.region_canonical.get(idx) {
                if seen.insert(name.as_str()) {
                    regions.push(name.clone());
                }
            }
        }
        regions
    }

    pub fn is_exception(&self, canonical: &str) -> bool {
        self.exceptions.contains(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dictionaries::test_dictionaries;

    #[test]
    fn test_matches_are_distinct_and_ordered() {
        let set = PatternSet::new(&["report", "head of", "department"]).unwrap();
        let found = set.matches("department report, another report, head of department");

        assert_eq!(found, vec![2, 0, 1]);
        assert_eq!(set.count("nothing relevant"), 0);
    }

    #[test]
    fn test_overlapping_patterns_are_all_reported() {
        let set = PatternSet::new(&["north", "northland"]).unwrap();
        assert_eq!(set.count("welcome to northland"), 2);
    }

    #[test]
    fn test_canonical_regions_dedupes() {
        let mut dict = test_dictionaries();
        dict.regions
            .insert("northern".to_string(), "Northland".to_string());
        let matchers = Matchers::build(&dict).unwrap();

        let found = matchers.region_matches("northern border near the south and north");
        let regions = matchers.canonical_regions(&found);

        assert_eq!(regions, vec!["Northland", "Southland"]);
    }

    #[test]
    fn test_exceptions_lookup() {
        let matchers = Matchers::build(&test_dictionaries()).unwrap();
        assert!(matchers.is_exception("Central Office"));
        assert!(!matchers.is_exception("Northland"));
    }
}
