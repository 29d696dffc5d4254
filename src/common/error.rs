//! Error types for casekit
//!
//! Assertion failures are not errors: they are recorded on the test
//! context. These are the failures of the crate's own plumbing, like
//! reading configuration or loading a case table.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for casekit
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Case Table Errors ===
    #[error("Unsupported case table format '{0}'. Use .yaml, .yml or .toml")]
    UnsupportedTableFormat(String),

    #[error("Invalid case table '{path}': {reason}")]
    TableParse { path: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a file read error for a path
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a table parse error for a path
    pub fn table_parse(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::TableParse {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
