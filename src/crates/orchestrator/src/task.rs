//! Task records and their lifecycle.
//!
//! A task moves `pending -> running -> {completed | failed | cancelled}`;
//! `pending` may also go straight to `failed` (no executor) or `cancelled`.
//! Once terminal a record is never modified again, only swept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::{OrchestratorError, Result};

/// Tag selecting which executor runs a task.
///
/// Open-ended so deployments can register their own types; the built-in
/// ones are associated constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(Cow<'static, str>);

impl TaskType {
    pub const GENERATE_SCRIPT: TaskType = TaskType(Cow::Borrowed("generate-script"));
    pub const SPLIT_SCRIPT: TaskType = TaskType(Cow::Borrowed("split-script"));
    pub const GENERATE_SINGLE_IMAGE: TaskType = TaskType(Cow::Borrowed("generate-single-image"));
    pub const GENERATE_IMAGES: TaskType = TaskType(Cow::Borrowed("generate-images"));

    pub fn new(tag: impl Into<String>) -> Self {
        TaskType(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskType {
    fn from(tag: &str) -> Self {
        TaskType::new(tag)
    }
}

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for the engine
    Pending,
    /// Executor is running
    Running,
    /// Executor returned a result
    Completed,
    /// Executor failed, or no executor was registered
    Failed,
    /// Cancelled before reaching another terminal state
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the state machine allows `self -> next`.
    ///
    /// Re-asserting a non-terminal status is allowed so progress-only
    /// updates can carry it.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One asynchronous unit of generation work.
///
/// Serialized with camelCase keys and millisecond epoch timestamps; unset
/// optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub owner_ref: String,
    pub status: TaskStatus,
    /// 0-100, never decreases.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_text: Option<String>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A fresh `pending` record with a newly allocated id.
    pub fn new(task_type: TaskType, owner_ref: impl Into<String>, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4().simple()),
            task_type,
            owner_ref: owner_ref.into(),
            status: TaskStatus::Pending,
            progress: 0,
            progress_text: None,
            payload,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge `update` into the record.
    ///
    /// Rejects any change to a terminal record, transitions the state
    /// machine does not allow, and updates carrying both a result and an
    /// error. On rejection the record is left untouched. Progress is clamped
    /// to 100 and never lowered.
    pub fn apply(&mut self, update: TaskUpdate) -> Result<()> {
        if self.is_terminal() {
            return Err(OrchestratorError::InvalidStateTransition {
                from: self.status.to_string(),
                to: update.status.unwrap_or(self.status).to_string(),
            });
        }
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(OrchestratorError::InvalidStateTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
        }
        if update.result.is_some() && update.error.is_some() {
            return Err(OrchestratorError::ConflictingOutcome(self.id.clone()));
        }

        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if update.progress_text.is_some() {
            self.progress_text = update.progress_text;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if update.started_at.is_some() {
            self.started_at = update.started_at;
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial update merged by [`crate::TaskStore::update`]. `None` fields are
/// left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub progress_text: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pending -> running`, stamping `startedAt`.
    pub fn running() -> Self {
        Self {
            status: Some(TaskStatus::Running),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// `running -> completed` with the executor's result.
    pub fn completed(result: Value) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            result: Some(result),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Transition to `failed` with a human-readable message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Transition to `cancelled`.
    pub fn cancelled() -> Self {
        Self {
            status: Some(TaskStatus::Cancelled),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Progress-only update.
    pub fn progress(progress: u8, text: Option<String>) -> Self {
        Self {
            progress: Some(progress),
            progress_text: text,
            ..Self::default()
        }
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Task {
        Task::new(TaskType::GENERATE_SCRIPT, "project-1", json!({"topics": ["fractions"]}))
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = task();
        assert!(task.id.starts_with("task_"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(task().id, task().id);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = task();
        task.apply(TaskUpdate::running()).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());

        task.apply(TaskUpdate::completed(json!({"script": "..."}))).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let mut task = task();
        task.apply(TaskUpdate::cancelled()).unwrap();
        let snapshot = task.clone();

        assert!(task.apply(TaskUpdate::running()).is_err());
        assert!(task.apply(TaskUpdate::progress(50, None)).is_err());
        assert!(task.apply(TaskUpdate::failed("late")).is_err());
        assert_eq!(task, snapshot);
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut task = task();
        let err = task.apply(TaskUpdate::completed(json!(null))).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidStateTransition { .. }));
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_progress_is_clamped_and_monotone() {
        let mut task = task();
        task.apply(TaskUpdate::running()).unwrap();

        task.apply(TaskUpdate::progress(30, Some("calling".into()))).unwrap();
        task.apply(TaskUpdate::progress(10, Some("parsing".into()))).unwrap();
        assert_eq!(task.progress, 30);
        assert_eq!(task.progress_text.as_deref(), Some("parsing"));

        task.apply(TaskUpdate::progress(250, None)).unwrap();
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn test_result_and_error_are_exclusive() {
        let mut task = task();
        task.apply(TaskUpdate::running()).unwrap();

        let mut update = TaskUpdate::completed(json!({}));
        update.error = Some("boom".to_string());
        assert!(matches!(
            task.apply(update),
            Err(OrchestratorError::ConflictingOutcome(_))
        ));
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[test]
    fn test_serialization_shape() {
        let mut task = task();
        task.apply(TaskUpdate::running()).unwrap();
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["type"], "generate-script");
        assert_eq!(value["ownerRef"], "project-1");
        assert_eq!(value["status"], "running");
        assert!(value["createdAt"].is_i64());
        assert!(value["startedAt"].is_i64());
        assert!(value.get("completedAt").is_none());
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.task_type, TaskType::GENERATE_SCRIPT);
    }

    #[test]
    fn test_task_type_constants_match_tags() {
        assert_eq!(TaskType::from("split-script"), TaskType::SPLIT_SCRIPT);
        assert_eq!(TaskType::GENERATE_IMAGES.to_string(), "generate-images");
    }
}
