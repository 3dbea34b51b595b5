//! Task execution engine.

use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utils::ResilientClient;

use super::progress::ProgressReporter;
use crate::registry::{unregistered_type_message, ExecutorContext, ExecutorError, ExecutorRegistry};
use crate::store::TaskStore;
use crate::task::{TaskStatus, TaskUpdate};

/// Runs tasks through their lifecycle.
///
/// For each task:
/// 1. Load it; skip unless still `pending`
/// 2. Fail it immediately if no executor is registered for its type
/// 3. Wait for an execution slot, if admission control is on
/// 4. Move it to `running` and invoke the executor
/// 5. Record `completed`, `failed`, or leave it `cancelled`
///
/// The engine never returns an error to its caller; every executor error
/// and panic ends up on the task record.
pub struct ExecutionEngine {
    store: Arc<dyn TaskStore>,
    registry: Arc<ExecutorRegistry>,
    client: Arc<ResilientClient>,
    tokens: DashMap<String, CancellationToken>,
    permits: Option<Arc<Semaphore>>,
}

impl ExecutionEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<ExecutorRegistry>,
        client: Arc<ResilientClient>,
    ) -> Self {
        Self {
            store,
            registry,
            client,
            tokens: DashMap::new(),
            permits: None,
        }
    }

    /// Run at most `limit` tasks at once; the rest wait in `pending`.
    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.permits = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Execution slots currently free, when admission control is on.
    pub fn available_slots(&self) -> Option<usize> {
        self.permits.as_ref().map(|p| p.available_permits())
    }

    /// Tasks spawned and not yet finished.
    pub fn active_count(&self) -> usize {
        self.tokens.len()
    }

    /// Start executing `task_id` in the background.
    ///
    /// The cancellation token is registered before this returns, so a
    /// cancel issued right after submission is never missed.
    pub fn spawn(self: &Arc<Self>, task_id: impl Into<String>) -> JoinHandle<()> {
        let task_id = task_id.into();
        let cancel = CancellationToken::new();
        self.tokens.insert(task_id.clone(), cancel.clone());

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(&task_id, cancel).await;
            engine.tokens.remove(&task_id);
        })
    }

    /// Signal the task's token, aborting any in-flight outbound call.
    ///
    /// Only the token is touched; the store's status is the caller's job.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.tokens.get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn run(&self, task_id: &str, cancel: CancellationToken) {
        let Some(task) = self.store.get(task_id).await else {
            warn!(task_id, "Task vanished before execution");
            return;
        };
        if task.status != TaskStatus::Pending {
            debug!(task_id, status = %task.status, "Task no longer pending, not starting");
            return;
        }

        let Some(executor) = self.registry.get(&task.task_type) else {
            let message = unregistered_type_message(&task.task_type);
            error!(task_id, task_type = %task.task_type, "{}", message);
            self.record(task_id, TaskUpdate::failed(message)).await;
            return;
        };

        let Some(_permit) = self.admit(task_id, &cancel).await else {
            return;
        };

        let task = match self.store.update(task_id, TaskUpdate::running()).await {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(e) => {
                info!(task_id, "Task not started: {}", e);
                return;
            }
        };

        info!(task_id, task_type = %task.task_type, "Starting execution of task");
        let started = Instant::now();

        let ctx = ExecutorContext {
            progress: ProgressReporter::new(self.store.clone(), task_id, cancel.clone()),
            cancel,
            client: self.client.clone(),
        };

        let outcome = AssertUnwindSafe(executor.execute(&task, &ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExecutorError::Failed(panic_message(panic))));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(result) => match self.store.update(task_id, TaskUpdate::completed(result)).await {
                Ok(_) => info!(task_id, task_type = %task.task_type, elapsed_ms, "Task completed"),
                Err(_) => info!(task_id, elapsed_ms, "Task finished after cancellation, result discarded"),
            },
            Err(e) if e.is_cancelled() => {
                // Normally already cancelled by the caller; covers a token fired elsewhere.
                self.store.cancel(task_id).await;
                info!(task_id, task_type = %task.task_type, elapsed_ms, "Task cancelled");
            }
            Err(e) => {
                let message = e.to_string();
                warn!(task_id, task_type = %task.task_type, elapsed_ms, "Task failed: {}", message);
                self.record(task_id, TaskUpdate::failed(message)).await;
            }
        }
    }

    /// Wait for a slot. `None` means the task was cancelled while waiting.
    async fn admit(&self, task_id: &str, cancel: &CancellationToken) -> Option<Admission> {
        let Some(permits) = &self.permits else {
            return Some(Admission(None));
        };

        debug!(task_id, "Waiting for execution slot");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(task_id, "Task cancelled while waiting for a slot");
                None
            }
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => Some(Admission(Some(permit))),
                Err(e) => {
                    error!(task_id, "Execution slots closed: {}", e);
                    self.record(task_id, TaskUpdate::failed("execution slots closed")).await;
                    None
                }
            }
        }
    }

    async fn record(&self, task_id: &str, update: TaskUpdate) {
        if let Err(e) = self.store.update(task_id, update).await {
            debug!(task_id, "Outcome not recorded: {}", e);
        }
    }
}

/// Holds an execution slot, if admission control is on, until dropped.
struct Admission(#[allow(dead_code)] Option<OwnedSemaphorePermit>);

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("executor panicked: {}", detail)
}
