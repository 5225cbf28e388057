//! Core error types for topology operator operations.
//!
//! All errors are explicit and typed; nothing here panics.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for file and parsing operations.
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("file does not exist: {path}")]
    FileNotFound { path: PathBuf },

    // Parsing errors
    #[error("YAML parse error in '{source_name}': {reason}")]
    YamlParseFailed { source_name: String, reason: String },

    #[error("TOML parse error in '{source_name}': {reason}")]
    TomlParseFailed { source_name: String, reason: String },
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a YAML parse error.
    pub fn yaml_parse_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::YamlParseFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}
