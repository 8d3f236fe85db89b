//! Error types and recovery strategies for Earshot
//!
//! Every error carries one of three severity tiers:
//! - **Recoverable**: handled automatically (transient network failure, a
//!   negotiation that falls back to a direct stream, etc.)
//! - **Degraded**: the requested action is abandoned but the app continues
//!   (a book without audio metadata, a missing server URL, etc.)
//! - **Fatal**: the app cannot continue without user intervention
//!
//! Each error also names a recovery action so callers can decide between
//! retrying, falling back to a direct stream, or surfacing the failure.

use std::fmt;
use thiserror::Error;

/// What a caller should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    RetryImmediate,
    /// Server is struggling; wait before the next attempt
    RetryWithBackoff,
    /// Play the file through its direct, non-negotiated URL
    FallbackStream,
    DisableFeature,
    UserIntervention,
}

impl RecoveryAction {
    fn describe(self) -> &'static str {
        match self {
            Self::RetryImmediate => "Retrying immediately",
            Self::RetryWithBackoff => "Retrying with backoff",
            Self::FallbackStream => "Falling back to direct stream",
            Self::DisableFeature => "Disabling feature",
            Self::UserIntervention => "User intervention required",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// How bad an error is, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Recoverable,
    Degraded,
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Main error type for Earshot
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Network Errors =====
    /// Network request failed
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network timeout
    #[error("Network timeout after {seconds}s: {operation}")]
    NetworkTimeout { operation: String, seconds: u64 },

    /// No usable auth token could be obtained
    #[error("Authentication unavailable: {reason}")]
    AuthUnavailable { reason: String },

    // ===== Timeline / Metadata Errors =====
    /// The book has no audio files to build a timeline from
    #[error("Book {book_id} has no audio files")]
    EmptyTimeline { book_id: String },

    /// No server base URL is configured
    #[error("No server base URL configured")]
    MissingServerConfig,

    /// The book is not in local storage
    #[error("Book not found: {book_id}")]
    BookNotFound { book_id: String },

    /// The book's stored metadata has no audio-file list
    #[error("Book {book_id} has no audio file metadata")]
    NoAudioMetadata { book_id: String },

    /// The stored audio-file list could not be parsed
    #[error("Audio file metadata for book {book_id} is unreadable: {reason}")]
    MetadataParseError { book_id: String, reason: String },

    // ===== Negotiation Errors =====
    /// Polling for a transcoded stream ran out of attempts
    #[error("Stream negotiation for file {file_id} timed out after {attempts} attempts")]
    NegotiationTimeout { file_id: String, attempts: u32 },

    /// The negotiation endpoint failed outright
    #[error("Stream negotiation for file {file_id} failed: {message}")]
    NegotiationFailure {
        file_id: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Playback Errors =====
    /// The output engine rejected a command
    #[error("Output engine error: {message}")]
    OutputEngine { message: String },

    /// An operation needs an active book but none is loaded
    #[error("No book is currently loaded")]
    NoActiveBook,

    // ===== Storage / Configuration Errors =====
    /// A local store failed to read or write
    #[error("Storage error: {message}")]
    StorageError { message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NetworkError { .. }
            | Self::NetworkTimeout { .. }
            | Self::NegotiationTimeout { .. }
            | Self::NegotiationFailure { .. } => ErrorSeverity::Recoverable,

            Self::EmptyTimeline { .. }
            | Self::MissingServerConfig
            | Self::BookNotFound { .. }
            | Self::NoAudioMetadata { .. }
            | Self::MetadataParseError { .. }
            | Self::AuthUnavailable { .. }
            | Self::OutputEngine { .. }
            | Self::StorageError { .. } => ErrorSeverity::Degraded,

            Self::InternalError { .. } => ErrorSeverity::Fatal,

            Self::NoActiveBook
            | Self::InvalidConfiguration { .. }
            | Self::InvalidArgument { .. } => ErrorSeverity::Degraded,
        }
    }

    /// Suggested next step for whoever caught the error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::NetworkTimeout { .. } => RecoveryAction::RetryImmediate,
            Self::NetworkError { .. } => RecoveryAction::RetryWithBackoff,

            Self::NegotiationTimeout { .. } | Self::NegotiationFailure { .. } => {
                RecoveryAction::FallbackStream
            }

            Self::OutputEngine { .. } | Self::StorageError { .. } => {
                RecoveryAction::DisableFeature
            }

            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Short message for the listener, without internal detail
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkError { .. } | Self::NetworkTimeout { .. } => {
                "Cannot reach the server. Please check your connection.".to_string()
            }
            Self::AuthUnavailable { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }

            Self::EmptyTimeline { .. }
            | Self::BookNotFound { .. }
            | Self::NoAudioMetadata { .. }
            | Self::MetadataParseError { .. } => {
                "Unable to start playback for this book.".to_string()
            }
            Self::MissingServerConfig => {
                "Unable to start playback for this book. No server is configured.".to_string()
            }

            // Only ever visible as reduced quality
            Self::NegotiationTimeout { .. } | Self::NegotiationFailure { .. } => {
                "Playing the original audio format.".to_string()
            }

            Self::OutputEngine { .. } => "Playback was interrupted. Try again.".to_string(),
            Self::NoActiveBook => "Nothing is playing.".to_string(),

            Self::StorageError { .. } => "Your listening progress could not be saved.".to_string(),
            Self::InvalidConfiguration { setting, .. } => {
                format!("Invalid setting: {}. Please check your configuration.", setting)
            }

            Self::InternalError { .. } => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            Self::InvalidArgument { .. } => "Invalid input provided.".to_string(),
        }
    }

    /// Fatal errors are logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Wraps a transport failure, keeping it as the source
    pub fn network<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Negotiation failure for `file_id`, keeping `source` in the chain
    pub fn negotiation<E: std::error::Error + Send + Sync + 'static>(
        file_id: impl Into<String>,
        source: E,
    ) -> Self {
        Self::NegotiationFailure {
            file_id: file_id.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
