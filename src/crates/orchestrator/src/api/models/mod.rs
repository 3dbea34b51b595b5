//! API data transfer objects (DTOs) and response models

pub mod task;

pub use task::{CancelTaskResponse, CreateTaskRequest, CreateTaskResponse, TaskListQuery, TaskListResponse};

/// Liveness response
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: String,

    /// Service version
    pub version: String,
}

impl HealthResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            version: crate::version().to_string(),
        }
    }
}
