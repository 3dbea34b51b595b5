//! `split-script`: break a script into storyboard pages.

use async_trait::async_trait;
use genai::{
    parse_storyboards, ChatClient, ChatCompletionRequest, ChatMessage, PromptBuilder, VendorConfig,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::{parse_payload, require_config};
use crate::registry::{ExecutorContext, ExecutorError, TaskExecutor};
use crate::task::Task;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 8000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitPayload {
    #[serde(default)]
    script: String,
    #[serde(default = "default_storyboard_count")]
    storyboard_count: u32,
    #[serde(default)]
    keep_original: bool,
    text_api_config: Option<VendorConfig>,
}

fn default_storyboard_count() -> u32 {
    8
}

impl SplitPayload {
    fn check(&self) -> Result<&VendorConfig, ExecutorError> {
        if self.script.trim().is_empty() {
            return Err(ExecutorError::InvalidPayload("script is required".to_string()));
        }
        if self.storyboard_count == 0 {
            return Err(ExecutorError::InvalidPayload(
                "storyboardCount must be at least 1".to_string(),
            ));
        }
        require_config(self.text_api_config.as_ref(), "textApiConfig")
    }
}

/// Splits a script into `[{id, sceneDescription, storyText}]`.
pub struct SplitExecutor {
    prompts: Arc<dyn PromptBuilder>,
}

impl SplitExecutor {
    pub fn new(prompts: Arc<dyn PromptBuilder>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl TaskExecutor for SplitExecutor {
    fn validate(&self, payload: &Value) -> Result<(), ExecutorError> {
        parse_payload::<SplitPayload>(payload)?.check().map(|_| ())
    }

    async fn execute(&self, task: &Task, ctx: &ExecutorContext) -> Result<Value, ExecutorError> {
        let payload: SplitPayload = parse_payload(&task.payload)?;
        ctx.report(10, "Preparing storyboard split").await?;
        let config = payload.check()?;

        let chat = ChatClient::new(&ctx.client, config)?;
        let prompt = self.prompts.split_prompt(
            &payload.script,
            payload.storyboard_count,
            payload.keep_original,
        );
        let request = ChatCompletionRequest::new(&config.model, vec![ChatMessage::user_text(prompt)])
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        ctx.report(30, "Calling text model").await?;
        let raw_content = chat.complete(&request, &ctx.cancel).await?;

        ctx.report(70, "Parsing storyboards").await?;
        let storyboards = parse_storyboards(&raw_content);
        if storyboards.is_empty() {
            warn!(task_id = %task.id, "No storyboard headings found in reply");
        } else {
            info!(
                task_id = %task.id,
                requested = payload.storyboard_count,
                parsed = storyboards.len(),
                "Storyboards parsed"
            );
        }

        ctx.report(100, "Storyboards ready").await?;
        Ok(json!({
            "rawContent": raw_content,
            "storyboards": storyboards,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genai::DefaultPromptBuilder;

    fn executor() -> SplitExecutor {
        SplitExecutor::new(Arc::new(DefaultPromptBuilder::new()))
    }

    fn config() -> Value {
        json!({"type": "volcengine", "apiUrl": "https://ark.test/api/v3", "apiKey": "k", "model": "doubao"})
    }

    #[test]
    fn test_defaults() {
        let payload: SplitPayload =
            parse_payload(&json!({"script": "once", "textApiConfig": config()})).unwrap();
        assert_eq!(payload.storyboard_count, 8);
        assert!(!payload.keep_original);
    }

    #[test]
    fn test_validate() {
        let executor = executor();
        assert!(executor
            .validate(&json!({"script": "once upon a time", "textApiConfig": config()}))
            .is_ok());

        let err = executor
            .validate(&json!({"script": "   ", "textApiConfig": config()}))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid payload: script is required");

        let err = executor
            .validate(&json!({"script": "x", "storyboardCount": 0, "textApiConfig": config()}))
            .unwrap_err();
        assert!(err.to_string().contains("storyboardCount"));

        let err = executor
            .validate(&json!({"script": "x", "textApiConfig": {"type": "openai", "apiUrl": "https://x"}}))
            .unwrap_err();
        assert!(err.to_string().contains("missing apiKey, model"));
    }
}
