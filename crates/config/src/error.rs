//! Errors raised while loading, validating or saving `config.toml`

use std::path::PathBuf;
use thiserror::Error;

/// Shorthand used throughout the config crate
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything that can go wrong with the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but is not valid TOML for [`Config`](crate::Config)
    #[error("{path} is not a valid config file: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot encode config as TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// One or more sections hold out-of-range values
    #[error("Invalid config: {0}")]
    ValidationError(String),

    /// An environment override could not be parsed
    #[error("Environment variable {variable} has unusable value '{value}'")]
    InvalidEnvOverride { variable: String, value: String },

    #[error("Cannot create config directory {path}: {source}")]
    DirectoryCreationError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No platform config directory (no home directory, usually)
    #[error("No config directory available: {reason}")]
    PathResolutionError { reason: String },

    #[error("Cannot back up the previous config: {source}")]
    BackupError { source: std::io::Error },

    #[error("Config I/O failed: {0}")]
    IoError(#[from] std::io::Error),
}

/// A single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the field (e.g., "player.default_speed")
    pub field: String,

    /// What is wrong with it
    pub message: String,

    /// Offending value, when it is worth showing
    pub value: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Same as [`new`](Self::new), also recording the rejected value
    pub fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: Some(value.to_string()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} (was {})", self.field, self.message, value),
            None => write!(f, "{} {}", self.field, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}
