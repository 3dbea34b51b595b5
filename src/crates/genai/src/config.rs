//! Vendor API configuration supplied per task.

use crate::error::{GenAiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which wire format a vendor speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    /// OpenAI-compatible gateway
    OpenAi,
    /// Volcengine (OpenAI-compatible chat, own image endpoint)
    Volcengine,
    /// Google Imagen predict endpoint
    GoogleImagen,
}

impl Vendor {
    /// Parse a vendor `type` tag.
    pub fn from_type(tag: &str) -> Option<Self> {
        match tag {
            "openai" => Some(Vendor::OpenAi),
            "volcengine" => Some(Vendor::Volcengine),
            "google-imagen" => Some(Vendor::GoogleImagen),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Volcengine => "volcengine",
            Vendor::GoogleImagen => "google-imagen",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor connection settings, passed opaquely from the caller to the client.
///
/// Serialized with the caller's camelCase field names:
/// `{type, apiUrl, apiKey, model, apiEndpoint}`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VendorConfig {
    #[serde(rename = "type", default)]
    pub vendor_type: String,

    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub model: String,

    /// `"chat"` routes image generation through chat completions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

impl VendorConfig {
    pub fn new(
        vendor_type: impl Into<String>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            vendor_type: vendor_type.into(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            api_endpoint: None,
        }
    }

    /// Set the endpoint hint.
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    /// Check that url, key and model are present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("apiUrl", self.api_url.trim().is_empty()),
            ("apiKey", self.api_key.trim().is_empty()),
            ("model", self.model.trim().is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenAiError::InvalidConfig(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// Parsed vendor, if the tag is known.
    pub fn vendor(&self) -> Option<Vendor> {
        Vendor::from_type(&self.vendor_type)
    }

    /// Join `path` onto the base url, inserting exactly one `/`.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Gemini-family models generate images through an OpenAI-compatible relay.
    pub fn is_gemini_model(&self) -> bool {
        self.model.to_lowercase().contains("gemini")
    }

    /// Whether image generation should go through chat completions.
    pub fn uses_chat_endpoint(&self) -> bool {
        self.api_endpoint.as_deref() == Some("chat")
    }
}

impl fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorConfig")
            .field("vendor_type", &self.vendor_type)
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}
