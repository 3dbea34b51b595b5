//! Progress reporting with a cooperative cancellation checkpoint.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::ExecutorError;
use crate::store::TaskStore;
use crate::task::{TaskStatus, TaskUpdate};

/// Writes progress for one task.
///
/// Every call first checks the live record: if the task has been cancelled
/// (or is gone), the call returns [`ExecutorError::Cancelled`] instead of
/// writing, and the executor is expected to propagate it with `?`.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn TaskStore>,
    task_id: String,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn TaskStore>, task_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            store,
            task_id: task_id.into(),
            cancel,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Record `progress` (0-100) and a status line.
    pub async fn report(&self, progress: u8, text: impl Into<String>) -> Result<(), ExecutorError> {
        self.checkpoint().await?;

        let text = text.into();
        debug!(task_id = %self.task_id, progress, text = %text, "Progress");

        match self
            .store
            .update(&self.task_id, TaskUpdate::progress(progress, Some(text)))
            .await
        {
            Ok(Some(_)) => Ok(()),
            // Record vanished or turned terminal between the check and the write.
            Ok(None) | Err(_) => Err(ExecutorError::Cancelled),
        }
    }

    /// Fail with [`ExecutorError::Cancelled`] if the task was cancelled.
    pub async fn checkpoint(&self) -> Result<(), ExecutorError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        match self.store.get(&self.task_id).await {
            Some(task) if task.status != TaskStatus::Cancelled => Ok(()),
            _ => Err(ExecutorError::Cancelled),
        }
    }
}
