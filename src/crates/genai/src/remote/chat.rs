//! OpenAI-compatible chat completions.

use crate::config::{Vendor, VendorConfig};
use crate::error::{GenAiError, Result};
use crate::normalize::extract_text;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use utils::ResilientClient;

/// Request body for `chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(MessageContent::Text(text.into()))
    }
}

/// Plain string or multi-part content.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Text-generation client for one vendor configuration.
pub struct ChatClient<'a> {
    client: &'a ResilientClient,
    config: &'a VendorConfig,
}

impl<'a> ChatClient<'a> {
    /// Accepts `openai` and `volcengine` vendors only.
    pub fn new(client: &'a ResilientClient, config: &'a VendorConfig) -> Result<Self> {
        config.validate()?;
        match config.vendor() {
            Some(Vendor::OpenAi) | Some(Vendor::Volcengine) => Ok(Self { client, config }),
            _ => Err(GenAiError::UnsupportedVendor(config.vendor_type.clone())),
        }
    }

    pub fn url(&self) -> String {
        self.config.endpoint("chat/completions")
    }

    /// Send the request and return the raw JSON reply.
    pub async fn complete_raw(
        &self,
        request: &ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let body = serde_json::to_value(request)?;
        super::post_json(self.client, self.config, self.url(), body, cancel).await
    }

    /// Send the request and return the assistant's text.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let reply = self.complete_raw(request, cancel).await?;
        extract_text(&reply)
    }
}
