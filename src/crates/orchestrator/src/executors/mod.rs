//! Built-in executors.
//!
//! | Task type | Executor |
//! |---|---|
//! | `generate-script` | [`ScriptExecutor`] |
//! | `split-script` | [`SplitExecutor`] |
//! | `generate-single-image` | [`SingleImageExecutor`] |
//! | `generate-images` | [`BatchImageExecutor`] |

pub mod image;
pub mod script;
pub mod split;

pub use image::{BatchImageExecutor, SingleImageExecutor};
pub use script::ScriptExecutor;
pub use split::SplitExecutor;

use genai::{PromptBuilder, VendorConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::registry::{ExecutorError, ExecutorRegistry};
use crate::task::TaskType;

impl ExecutorRegistry {
    /// Registry with every built-in executor, sharing `prompts`.
    pub fn builtin(prompts: Arc<dyn PromptBuilder>) -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry, prompts);
        registry
    }
}

/// Register the built-in executors into `registry`.
pub fn register_builtin(registry: &mut ExecutorRegistry, prompts: Arc<dyn PromptBuilder>) {
    let images = Arc::new(image::ImagePipeline::new(prompts.clone()));
    registry
        .register(TaskType::GENERATE_SCRIPT, Arc::new(ScriptExecutor::new(prompts.clone())))
        .register(TaskType::SPLIT_SCRIPT, Arc::new(SplitExecutor::new(prompts)))
        .register(
            TaskType::GENERATE_SINGLE_IMAGE,
            Arc::new(SingleImageExecutor::new(images.clone())),
        )
        .register(TaskType::GENERATE_IMAGES, Arc::new(BatchImageExecutor::new(images)));
}

pub(crate) fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, ExecutorError> {
    Ok(T::deserialize(payload)?)
}

/// A vendor config that is present and has url, key and model.
pub(crate) fn require_config<'a>(
    config: Option<&'a VendorConfig>,
    field: &str,
) -> Result<&'a VendorConfig, ExecutorError> {
    let config =
        config.ok_or_else(|| ExecutorError::InvalidPayload(format!("{} is required", field)))?;
    config
        .validate()
        .map_err(|e| ExecutorError::InvalidPayload(format!("{}: {}", field, e)))?;
    Ok(config)
}
