//! Error types for generation-vendor calls.

use thiserror::Error;
use utils::GatewayError;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenAiError>;

/// Errors that can occur while talking to a generation vendor.
#[derive(Debug, Error)]
pub enum GenAiError {
    /// The outbound call failed (after retries, if any applied).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The response parsed but carried no recognisable image.
    #[error("no image found in response")]
    NoImageFound,

    /// The response parsed but carried no text content.
    #[error("no text found in response")]
    NoTextFound,

    /// The vendor `type` is not supported for this kind of call.
    #[error("unsupported vendor type: {0}")]
    UnsupportedVendor(String),

    /// Vendor configuration is incomplete.
    #[error("invalid vendor configuration: {0}")]
    InvalidConfig(String),

    /// An image could not be decoded or re-encoded.
    #[error("image processing failed: {0}")]
    Image(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl GenAiError {
    /// Whether the failure was a cancellation of the underlying call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenAiError::Gateway(err) if err.is_cancelled())
    }
}

impl From<serde_json::Error> for GenAiError {
    fn from(err: serde_json::Error) -> Self {
        GenAiError::SerializationError(err.to_string())
    }
}

impl From<image::ImageError> for GenAiError {
    fn from(err: image::ImageError) -> Self {
        GenAiError::Image(err.to_string())
    }
}

impl From<base64::DecodeError> for GenAiError {
    fn from(err: base64::DecodeError) -> Self {
        GenAiError::Image(format!("invalid base64 payload: {}", err))
    }
}
