//! `generate-script`: textbook pages or topics to a picture-book script.

use async_trait::async_trait;
use genai::{
    ChatClient, ChatCompletionRequest, ChatMessage, ContentPart, MessageContent, PromptBuilder,
    ScriptSource, VendorConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{parse_payload, require_config};
use crate::registry::{ExecutorContext, ExecutorError, TaskExecutor};
use crate::task::Task;

/// Upper bound on attached page images.
pub const MAX_SCRIPT_IMAGES: usize = 20;

const TEMPERATURE: f32 = 0.8;
const MAX_TOKENS: u32 = 8000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptPayload {
    /// Data URIs of textbook pages.
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    plot_direction: String,
    text_api_config: Option<VendorConfig>,
}

impl ScriptPayload {
    fn check(&self) -> Result<&VendorConfig, ExecutorError> {
        let topics = self.topics.iter().any(|t| !t.trim().is_empty());
        if self.images.is_empty() && !topics {
            return Err(ExecutorError::InvalidPayload(
                "at least one image or topic is required".to_string(),
            ));
        }
        if self.images.len() > MAX_SCRIPT_IMAGES {
            return Err(ExecutorError::InvalidPayload(format!(
                "at most {} images are allowed, got {}",
                MAX_SCRIPT_IMAGES,
                self.images.len()
            )));
        }
        require_config(self.text_api_config.as_ref(), "textApiConfig")
    }

    fn source(&self) -> ScriptSource<'_> {
        if self.images.is_empty() {
            ScriptSource::Topics(&self.topics)
        } else {
            ScriptSource::Images(self.images.len())
        }
    }
}

/// Writes a script from page images or topics through chat completions.
pub struct ScriptExecutor {
    prompts: Arc<dyn PromptBuilder>,
}

impl ScriptExecutor {
    pub fn new(prompts: Arc<dyn PromptBuilder>) -> Self {
        Self { prompts }
    }

    fn request(&self, payload: &ScriptPayload, model: &str) -> ChatCompletionRequest {
        let mut parts = vec![ContentPart::text(
            self.prompts
                .script_user_prompt(payload.source(), &payload.plot_direction),
        )];
        parts.extend(payload.images.iter().map(ContentPart::image));

        ChatCompletionRequest::new(
            model,
            vec![
                ChatMessage::system(self.prompts.script_system_prompt()),
                ChatMessage::user(MessageContent::Parts(parts)),
            ],
        )
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS)
    }
}

#[async_trait]
impl TaskExecutor for ScriptExecutor {
    fn validate(&self, payload: &Value) -> Result<(), ExecutorError> {
        parse_payload::<ScriptPayload>(payload)?.check().map(|_| ())
    }

    async fn execute(&self, task: &Task, ctx: &ExecutorContext) -> Result<Value, ExecutorError> {
        let payload: ScriptPayload = parse_payload(&task.payload)?;
        ctx.report(10, "Preparing script generation").await?;
        let config = payload.check()?;

        if !payload.images.is_empty() {
            ctx.report(20, format!("Processing {} images", payload.images.len()))
                .await?;
        }

        let chat = ChatClient::new(&ctx.client, config)?;
        let request = self.request(&payload, &config.model);

        ctx.report(30, "Calling text model").await?;
        let script = chat.complete(&request, &ctx.cancel).await?;

        ctx.report(80, "Parsing response").await?;
        info!(task_id = %task.id, chars = script.chars().count(), "Script generated");

        ctx.report(100, "Script ready").await?;
        Ok(json!({ "script": script.trim() }))
    }
}
