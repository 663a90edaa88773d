//! Error types for journal-mcp.
//!
//! Configuration and storage errors live here; protocol-layer error types
//! (validation, registry, sampling) are defined next to the code that
//! produces them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors that can occur against the journal store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A referenced row does not exist.
    #[error("{kind} with ID \"{id}\" not found")]
    NotFound {
        /// Row kind ("entry" or "tag").
        kind: &'static str,
        /// The requested ID.
        id: i64,
    },

    /// A tag with the same name already exists.
    ///
    /// Tag names are compared with SQLite's BINARY collation, so this is a
    /// case-sensitive exact match.
    #[error("a tag named \"{name}\" already exists")]
    DuplicateTagName {
        /// The conflicting name.
        name: String,
    },

    /// The tag is already attached to the entry.
    #[error("tag {tag_id} is already attached to entry {entry_id}")]
    DuplicateEntryTag {
        /// The entry side of the pair.
        entry_id: i64,
        /// The tag side of the pair.
        tag_id: i64,
    },
}
