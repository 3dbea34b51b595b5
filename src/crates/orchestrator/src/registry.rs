//! Executor registry.
//!
//! Built once at startup and shared with the engine; maps a [`TaskType`] to
//! the [`TaskExecutor`] that performs the work.

use async_trait::async_trait;
use genai::GenAiError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utils::{GatewayError, ResilientClient};

use crate::execution::ProgressReporter;
use crate::task::{Task, TaskType};

/// Errors an executor can return.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Cancellation observed at a checkpoint or inside an outbound call.
    /// Never recorded as a failure.
    #[error("task cancelled")]
    Cancelled,

    /// Payload is missing required fields or has the wrong shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Upstream call or response extraction failed.
    #[error(transparent)]
    Upstream(GenAiError),

    #[error("{0}")]
    Failed(String),
}

impl ExecutorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutorError::Cancelled)
    }
}

/// Failure message recorded for a task whose type has no executor.
pub fn unregistered_type_message(task_type: &TaskType) -> String {
    format!("no executor registered for task type '{}'", task_type)
}

impl From<GenAiError> for ExecutorError {
    fn from(err: GenAiError) -> Self {
        if err.is_cancelled() {
            ExecutorError::Cancelled
        } else {
            ExecutorError::Upstream(err)
        }
    }
}

impl From<GatewayError> for ExecutorError {
    fn from(err: GatewayError) -> Self {
        GenAiError::from(err).into()
    }
}

impl From<serde_json::Error> for ExecutorError {
    fn from(err: serde_json::Error) -> Self {
        ExecutorError::InvalidPayload(err.to_string())
    }
}

/// What the engine hands an executor for one run.
pub struct ExecutorContext {
    /// Progress checkpoint; also the cooperative cancellation point.
    pub progress: ProgressReporter,
    /// Cancelled when the task is; pass to every outbound call.
    pub cancel: CancellationToken,
    /// Shared outbound client.
    pub client: Arc<ResilientClient>,
}

impl ExecutorContext {
    /// Shorthand for `self.progress.report(..)`.
    pub async fn report(
        &self,
        progress: u8,
        text: impl Into<String>,
    ) -> Result<(), ExecutorError> {
        self.progress.report(progress, text).await
    }
}

/// Performs the work for one task type.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Synchronous payload check run at submission time.
    fn validate(&self, _payload: &Value) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Run the task and return its result.
    async fn execute(&self, task: &Task, ctx: &ExecutorContext) -> Result<Value, ExecutorError>;
}

/// Capability table from task type to executor.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskType, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `task_type`, replacing any previous one.
    pub fn register(&mut self, task_type: TaskType, executor: Arc<dyn TaskExecutor>) -> &mut Self {
        info!(task_type = %task_type, "Registered executor");
        self.executors.insert(task_type, executor);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, task_type: TaskType, executor: Arc<dyn TaskExecutor>) -> Self {
        self.register(task_type, executor);
        self
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.executors.contains_key(task_type)
    }

    /// Registered types, sorted.
    pub fn task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.executors.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("task_types", &self.task_types())
            .finish()
    }
}
