//! Task API models and DTOs
//!
//! Task records themselves are returned as [`crate::Task`]; these types
//! cover the request bodies and the small acknowledgement responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::validation::validate_not_empty;
use crate::task::{Task, TaskStatus};

/// Request to create a new task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Executor tag, e.g. `generate-script` (required)
    #[serde(rename = "type", default)]
    pub task_type: String,

    /// Caller correlation id, e.g. a project id (required)
    #[serde(default)]
    pub owner_ref: String,

    /// Executor input (required, opaque)
    #[serde(default)]
    pub payload: Value,
}

impl CreateTaskRequest {
    /// Validate the create request
    pub fn validate(&self) -> ApiResult<()> {
        validate_not_empty(&self.task_type, "type")?;
        validate_not_empty(&self.owner_ref, "ownerRef")?;
        if self.payload.is_null() {
            return Err(ApiError::ValidationError("payload is required".to_string()));
        }
        Ok(())
    }
}

/// Acknowledgement for a created task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub id: String,
    pub status: TaskStatus,
}

impl From<&Task> for CreateTaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            status: task.status,
        }
    }
}

/// Query parameters for listing tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    /// Owner to list tasks for (required)
    pub owner_ref: Option<String>,
}

/// Tasks for one owner, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

/// Acknowledgement for a cancelled task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub id: String,
    pub status: TaskStatus,
}
