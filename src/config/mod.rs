//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path specified via the CLI argument
//! 2. Default location:
//!    - **Linux/macOS:** `~/.journal-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.journal-mcp\config.json`
//!
//! A missing file at the default location is not an error; built-in defaults
//! are used instead. An explicitly given path must exist.

mod settings;

pub use settings::{Config, LoggingConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.journal-mcp/`
/// - **Windows:** `%USERPROFILE%\.journal-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".journal-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Returns the default database path (next to the config file).
#[must_use]
pub fn default_database_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("journal.db"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, the platform-specific default location is tried and
/// a missing file falls back to [`Config::default`].
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - A field fails validation
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => {
            let Some(default) = default_config_path() else {
                return Ok(Config::default());
            };
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_dir_exists() {
        assert!(default_config_dir().is_some());
    }

    #[test]
    fn default_config_path_exists() {
        let path = default_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("config.json"));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/config.json")));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "logging": { "level": "info" } }"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
