//! Background task orchestration for the storybook service.
//!
//! Long AI-generation jobs are submitted as [`Task`]s, run asynchronously by
//! the [`ExecutionEngine`], and polled by the UI through the HTTP task API.
//!
//! - [`task`]: task record, status state machine, partial updates
//! - [`store`]: the [`TaskStore`] interface and its in-memory implementation
//! - [`registry`]: task-type to executor table
//! - [`execution`]: the engine and the progress checkpoint handed to executors
//! - [`executors`]: built-in script, storyboard and image executors
//! - [`queue`]: the [`TaskQueue`] facade and retention sweeper
//! - [`api`]: axum router for `/tasks`
//! - [`config`]: server configuration

pub mod api;
pub mod config;
pub mod execution;
pub mod executors;
pub mod queue;
pub mod registry;
pub mod store;
pub mod task;

pub use execution::{ExecutionEngine, ProgressReporter};
pub use queue::TaskQueue;
pub use registry::{ExecutorContext, ExecutorError, ExecutorRegistry, TaskExecutor};
pub use store::{InMemoryTaskStore, TaskStore};
pub use task::{Task, TaskStatus, TaskType, TaskUpdate};

use thiserror::Error;

/// Errors that can occur during orchestration
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Task not found
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A task id was issued twice
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    /// Invalid state transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// An update tried to set both `result` and `error`
    #[error("Task {0} cannot carry both a result and an error")]
    ConflictingOutcome(String),

    /// Submission rejected before the task was created
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Crate version, reported by the health endpoint.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::InvalidStateTransition {
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from completed to running"
        );
    }
}
