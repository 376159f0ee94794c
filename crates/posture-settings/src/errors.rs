//! Settings errors.

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("settings file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not JSON, or a key has the wrong type.
    #[error("settings file is not valid: {0}")]
    Json(#[from] serde_json::Error),
    /// The merged settings describe a server that cannot run.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Shorthand for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;
