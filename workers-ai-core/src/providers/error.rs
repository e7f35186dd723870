//! Provider error types and handling

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Coarse classification of a [`ProviderError`], for callers that branch on
/// the failure without matching every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Coercion,
    Transport,
    Normalization,
    Stream,
    Configuration,
    Cancelled,
}

/// Errors that can occur when talking to Workers AI
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A passthrough setting cannot be represented for the active transport
    #[error("Value for option '{key}' is not able to be coerced into a string.")]
    Coercion { key: String },

    /// Non-success status, connection failure or binding failure
    #[error("Transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    /// The upstream payload matched none of the known response shapes
    #[error("Unrecognized response shape with top-level keys [{}]", .keys.join(", "))]
    Normalization { keys: Vec<String> },

    /// The stream was interrupted or carried a malformed chunk
    #[error("Stream error: {message}")]
    Stream { message: String },

    /// Invalid provider configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The call was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Build a transport error without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        ProviderError::Transport {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// Build a stream error
    pub fn stream(message: impl Into<String>) -> Self {
        ProviderError::Stream {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Coercion { .. } => ErrorKind::Coercion,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Normalization { .. } => ErrorKind::Normalization,
            Self::Stream { .. } => ErrorKind::Stream,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Request timed out: {}", err)
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            err.to_string()
        };

        ProviderError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message,
            body: None,
        }
    }
}

impl From<crate::config::ConfigError> for ProviderError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProviderError::Configuration(err.to_string())
    }
}
