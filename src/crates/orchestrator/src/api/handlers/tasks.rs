//! Task endpoint handlers
//!
//! Thin wrappers over [`crate::TaskQueue`]; records are returned as stored.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::validation::{validate_not_empty, validate_task_id},
    models::{CancelTaskResponse, CreateTaskRequest, CreateTaskResponse, TaskListQuery, TaskListResponse},
    routes::AppState,
};
use crate::task::{Task, TaskStatus, TaskType};
use crate::OrchestratorError;

/// Create and start a task
///
/// POST /tasks
pub async fn create_task(
    State(app_state): State<AppState>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateTaskResponse>)> {
    let Json(req) = body?;
    req.validate()?;

    let task = app_state
        .queue
        .create(TaskType::new(req.task_type), &req.owner_ref, req.payload)
        .await?;

    tracing::info!("Created task: {}", task.id);
    Ok((StatusCode::CREATED, Json(CreateTaskResponse::from(&task))))
}

/// List an owner's tasks, newest first
///
/// GET /tasks?ownerRef=...
pub async fn list_tasks(
    State(app_state): State<AppState>,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> ApiResult<Json<TaskListResponse>> {
    let Query(query) = query?;
    let owner_ref = query.owner_ref.unwrap_or_default();
    validate_not_empty(&owner_ref, "ownerRef")?;

    let tasks = app_state.queue.list_by_owner(&owner_ref).await;
    Ok(Json(TaskListResponse { tasks }))
}

/// Get a single task
///
/// GET /tasks/:id
pub async fn get_task(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    validate_task_id(&id)?;

    let task = app_state
        .queue
        .get(&id)
        .await
        .ok_or_else(|| OrchestratorError::TaskNotFound(id.clone()))?;

    Ok(Json(task))
}

/// Cancel a pending or running task
///
/// DELETE /tasks/:id
pub async fn cancel_task(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelTaskResponse>> {
    if !app_state.queue.cancel(&id).await {
        return Err(ApiError::BadRequest(format!(
            "Task {} does not exist or has already finished",
            id
        )));
    }

    tracing::info!("Cancelled task: {}", id);
    Ok(Json(CancelTaskResponse {
        id,
        status: TaskStatus::Cancelled,
    }))
}
