//! Text analysis for errand classification.
//!
//! - `Dictionaries`: static pattern groups, built-in or loaded from TOML
//! - `Matchers`: compiled automata, shared read-only between workers
//! - `ClassificationEngine`: per-record errand, region and type detection
//! - `tag_exceptions`: post-classification checks

pub mod dictionaries;
pub mod engine;
pub mod matchers;
pub mod validate;

pub use dictionaries::Dictionaries;
pub use engine::{ClassificationEngine, ErrandVerdict, normalize_title};
pub use matchers::{Matchers, PatternSet};
pub use validate::tag_exceptions;
