//! Error types for network operations

use earshot_core::AppError;
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur while talking to the server
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (connect, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not the expected JSON
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl NetworkError {
    /// Whether trying the same request again could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Http(e) => !e.is_builder() && !e.is_decode(),
            NetworkError::Status { status, .. } => *status >= 500 || *status == 429,
            NetworkError::Decode(_) | NetworkError::InvalidUrl(_) => false,
        }
    }

    /// Returns true for 4xx responses
    pub fn is_client_error(&self) -> bool {
        matches!(self, NetworkError::Status { status, .. } if (400..500).contains(status))
    }

    /// Returns true for 5xx responses
    pub fn is_server_error(&self) -> bool {
        matches!(self, NetworkError::Status { status, .. } if *status >= 500)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Http(e) if e.is_timeout())
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        let message = err.to_string();
        AppError::network(message, err)
    }
}
