//! Task queue facade.
//!
//! [`TaskQueue`] is what the HTTP layer talks to: it validates submissions,
//! stores them, hands them to the engine and routes cancellation to both the
//! record and the in-flight token.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::execution::ExecutionEngine;
use crate::registry::{unregistered_type_message, ExecutorError};
use crate::store::TaskStore;
use crate::task::{Task, TaskType, TaskUpdate};
use crate::{OrchestratorError, Result};

/// Default interval between retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<dyn TaskStore>,
    engine: Arc<ExecutionEngine>,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn TaskStore>, engine: Arc<ExecutionEngine>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Validate, store and start a task. Returns the `pending` record
    /// without waiting for execution.
    ///
    /// Payloads for registered types go through the executor's
    /// [`validate`](crate::TaskExecutor::validate). An unregistered type is
    /// stored and marked `failed` before this returns, and never spawned.
    pub async fn create(&self, task_type: TaskType, owner_ref: &str, payload: Value) -> Result<Task> {
        if task_type.as_str().trim().is_empty() {
            return Err(OrchestratorError::Validation("type is required".to_string()));
        }
        if owner_ref.trim().is_empty() {
            return Err(OrchestratorError::Validation("ownerRef is required".to_string()));
        }

        let executor = self.engine.registry().get(&task_type);
        if let Some(executor) = &executor {
            executor.validate(&payload).map_err(|e| match e {
                ExecutorError::InvalidPayload(message) => OrchestratorError::Validation(message),
                other => OrchestratorError::Validation(other.to_string()),
            })?;
        }

        let task = self.store.create(task_type, owner_ref, payload).await?;
        info!(task_id = %task.id, task_type = %task.task_type, owner_ref, "Created task");

        if executor.is_none() {
            let message = unregistered_type_message(&task.task_type);
            error!(task_id = %task.id, task_type = %task.task_type, "{}", message);
            let failed = self.store.update(&task.id, TaskUpdate::failed(message)).await?;
            return Ok(failed.unwrap_or(task));
        }

        self.engine.spawn(task.id.clone());
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.store.get(id).await
    }

    /// Tasks for `owner_ref`, newest first.
    pub async fn list_by_owner(&self, owner_ref: &str) -> Vec<Task> {
        self.store.list_by_owner(owner_ref).await
    }

    /// Cancel a non-terminal task and abort its in-flight call, if any.
    pub async fn cancel(&self, id: &str) -> bool {
        if !self.store.cancel(id).await {
            return false;
        }
        if !self.engine.cancel(id) {
            debug!(task_id = id, "No active execution to signal");
        }
        true
    }

    pub async fn sweep(&self) -> usize {
        let removed = self.store.sweep().await;
        if removed > 0 {
            info!(removed, "Swept expired tasks");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `period` until `shutdown` fires.
    pub fn spawn_sweeper(&self, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Task sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Task sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        queue.sweep().await;
                    }
                }
            }
        })
    }
}
