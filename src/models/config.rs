//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// History paging and enrichment settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Classification worker settings
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Channels to fetch, with their errand-detection strategy
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.page_size == 0 {
            return Err(AppError::validation("fetch.page_size must be > 0"));
        }
        if self.fetch.enrich_workers == 0 {
            return Err(AppError::validation("fetch.enrich_workers must be > 0"));
        }
        if self.fetch.channel_capacity == 0 {
            return Err(AppError::validation("fetch.channel_capacity must be > 0"));
        }
        if self.classify.workers == 0 {
            return Err(AppError::validation("classify.workers must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::validation("source name is empty"));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "source {} is defined twice",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Names of all configured sources.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            classify: ClassifyConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// History paging and enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Messages requested per history page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Enrichment workers per source
    #[serde(default = "defaults::workers")]
    pub enrich_workers: usize,

    /// Capacity of every inter-stage channel
    #[serde(default = "defaults::channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            enrich_workers: defaults::workers(),
            channel_capacity: defaults::channel_capacity(),
        }
    }
}

/// Classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Classification workers sharing the record stream
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Optional TOML file replacing the built-in dictionaries
    #[serde(default)]
    pub dictionaries: Option<PathBuf>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            dictionaries: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the record storage
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,

    /// Directory holding `{source}.json` history exports
    #[serde(default = "defaults::export_dir")]
    pub export_dir: PathBuf,

    /// Directory receiving report summaries
    #[serde(default = "defaults::report_dir")]
    pub report_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
            export_dir: defaults::export_dir(),
            report_dir: defaults::report_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::models::{ErrandStrategy, SourceConfig};

    // Fetch defaults
    pub fn page_size() -> usize {
        50
    }
    pub fn workers() -> usize {
        5
    }
    pub fn channel_capacity() -> usize {
        1
    }

    pub fn log_level() -> String {
        "info".into()
    }

    // Path defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn export_dir() -> PathBuf {
        PathBuf::from("storage/exports")
    }
    pub fn report_dir() -> PathBuf {
        PathBuf::from("reports")
    }

    // Source defaults
    pub fn sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig::new("sledcom_press", ErrandStrategy::TripleVote),
            SourceConfig::new("infocentrskrf", ErrandStrategy::PrefixOnly),
        ]
    }
}
