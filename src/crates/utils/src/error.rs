//! Error types for the HTTP and configuration helpers.

use crate::client::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result type for configuration and setup operations.
pub type Result<T> = std::result::Result<T, UtilsError>;

/// Longest upstream error body kept in a [`GatewayError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Errors that can occur while loading configuration or building clients.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP client could not be constructed.
    #[error("Client error: {0}")]
    ClientError(String),
}

impl From<serde_json::Error> for UtilsError {
    fn from(err: serde_json::Error) -> Self {
        UtilsError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for UtilsError {
    fn from(err: toml::de::Error) -> Self {
        UtilsError::SerializationError(err.to_string())
    }
}

/// Failure of one logical outbound call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// No HTTP response was received.
    #[error("request failed without a response: {0}")]
    Transport(#[from] TransportError),

    /// Upstream answered 2xx but the body is not JSON.
    #[error("upstream response is not valid JSON: {0}")]
    InvalidJson(String),

    /// The caller cancelled the call.
    #[error("request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Build a status error, truncating oversized bodies.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        GatewayError::Status { status, body }
    }

    /// Build the error used when the hard per-attempt deadline fires.
    pub fn deadline(timeout: Duration) -> Self {
        GatewayError::Transport(TransportError::timeout(format!(
            "request timed out after {}ms",
            timeout.as_millis()
        )))
    }

    /// HTTP status code, if the upstream answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error came from a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}
