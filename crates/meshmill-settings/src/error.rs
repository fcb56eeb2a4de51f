//! Error types for the settings crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, saving or validating a job file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file extension is neither `.toml` nor `.json`.
    #[error("Unsupported config format for {path:?}: expected .toml or .json")]
    UnsupportedFormat { path: PathBuf },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A configuration value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl SettingsError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
