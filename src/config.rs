// src/config.rs

//! Configuration loading utilities.
//!
//! Loads the run configuration and the classification dictionaries, and
//! compiles the dictionaries into shared matchers.

use std::path::Path;
use std::sync::Arc;

use crate::analysis::{Dictionaries, Matchers};
use crate::error::Result;
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults; a file that fails to parse is an
/// error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let config = Config::load(path)?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Dictionaries named by `classify.dictionaries`, or the built-in set.
pub fn load_dictionaries(config: &Config) -> Result<Dictionaries> {
    let dictionaries = Dictionaries::load_or_builtin(config.classify.dictionaries.as_deref())?;
    log::debug!(
        "Dictionaries: {} regions, {} exceptions",
        dictionaries.regions.len(),
        dictionaries.exceptions.len()
    );
    Ok(dictionaries)
}

/// Validate `config` and compile its dictionaries once for all workers.
pub fn build_matchers(config: &Config) -> Result<Arc<Matchers>> {
    config.validate()?;
    let dictionaries = load_dictionaries(config)?;
    Ok(Arc::new(Matchers::build(&dictionaries)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_missing_config_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_broken_config_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[fetch\npage_size = ").unwrap();

        assert!(matches!(load_config(&path), Err(AppError::Toml(_))));
    }

    #[test]
    fn test_default_config_builds_matchers() {
        assert!(build_matchers(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_config_fails_before_matchers() {
        let mut config = Config::default();
        config.fetch.page_size = 0;
        assert!(matches!(
            build_matchers(&config),
            Err(AppError::Validation(_))
        ));
    }
}
