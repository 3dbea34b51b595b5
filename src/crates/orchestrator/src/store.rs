//! Task storage.
//!
//! [`TaskStore`] is the only way callers touch task records, so the
//! in-memory map can later be replaced without changing the engine or API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::task::{Task, TaskStatus, TaskType, TaskUpdate};
use crate::{OrchestratorError, Result};

/// Default time a terminal task is kept after `completedAt`.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Process-wide registry of task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a fresh `pending` record.
    async fn create(&self, task_type: TaskType, owner_ref: &str, payload: Value) -> Result<Task>;

    async fn get(&self, id: &str) -> Option<Task>;

    /// All tasks for `owner_ref`, newest first.
    async fn list_by_owner(&self, owner_ref: &str) -> Vec<Task>;

    /// Merge `update` into the record. `Ok(None)` if the id is unknown.
    async fn update(&self, id: &str, update: TaskUpdate) -> Result<Option<Task>>;

    /// Cancel a `pending` or `running` task. `false` if absent or terminal.
    async fn cancel(&self, id: &str) -> bool;

    /// Drop terminal tasks whose `completedAt` is older than the retention
    /// window. Returns how many were removed.
    async fn sweep(&self) -> usize;
}

/// [`TaskStore`] backed by a sharded concurrent map.
///
/// Each update runs under the entry's shard lock, so a cancel and an
/// executor write on the same task cannot interleave mid-merge.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: DashMap<String, Task>,
    retention: Duration,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove terminal tasks completed before `cutoff`.
    pub fn sweep_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| !matches!(task.completed_at, Some(done) if done < cutoff));
        before.saturating_sub(self.tasks.len())
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task_type: TaskType, owner_ref: &str, payload: Value) -> Result<Task> {
        let task = Task::new(task_type, owner_ref, payload);
        match self.tasks.entry(task.id.clone()) {
            Entry::Occupied(_) => Err(OrchestratorError::DuplicateTask(task.id)),
            Entry::Vacant(slot) => {
                slot.insert(task.clone());
                debug!(task_id = %task.id, task_type = %task.task_type, "Task stored");
                Ok(task)
            }
        }
    }

    async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    async fn list_by_owner(&self, owner_ref: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| entry.owner_ref == owner_ref)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    async fn update(&self, id: &str, update: TaskUpdate) -> Result<Option<Task>> {
        let Some(mut entry) = self.tasks.get_mut(id) else {
            return Ok(None);
        };
        entry.apply(update)?;
        Ok(Some(entry.value().clone()))
    }

    async fn cancel(&self, id: &str) -> bool {
        let Some(mut entry) = self.tasks.get_mut(id) else {
            return false;
        };
        if !matches!(entry.status, TaskStatus::Pending | TaskStatus::Running) {
            return false;
        }
        match entry.apply(TaskUpdate::cancelled()) {
            Ok(()) => {
                info!(task_id = %id, "Task cancelled");
                true
            }
            Err(_) => false,
        }
    }

    async fn sweep(&self) -> usize {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        self.sweep_before(Utc::now() - retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded(store: &InMemoryTaskStore, owner: &str) -> Task {
        store
            .create(TaskType::SPLIT_SCRIPT, owner, json!({"script": "once upon a time"}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryTaskStore::new();
        let task = seeded(&store, "p1").await;

        let fetched = store.get(&task.id).await.unwrap();
        assert_eq!(fetched, task);
        assert!(store.get("task_missing").await.is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let store = InMemoryTaskStore::new();
        let first = seeded(&store, "p1").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = seeded(&store, "p1").await;
        seeded(&store, "p2").await;

        let listed = store.list_by_owner("p1").await;
        let ids: Vec<_> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert!(store.list_by_owner("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_update_absent_is_noop() {
        let store = InMemoryTaskStore::new();
        let outcome = store
            .update("task_missing", TaskUpdate::progress(10, None))
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_stamps_updated_at() {
        let store = InMemoryTaskStore::new();
        let task = seeded(&store, "p1").await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let updated = store
            .update(&task.id, TaskUpdate::running())
            .await
            .unwrap()
            .unwrap();
        assert!(updated.updated_at > task.updated_at);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let store = InMemoryTaskStore::new();

        let pending = seeded(&store, "p1").await;
        assert!(store.cancel(&pending.id).await);
        let cancelled = store.get(&pending.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
        assert!(cancelled.error.is_none() && cancelled.result.is_none());

        // already terminal
        assert!(!store.cancel(&pending.id).await);
        assert!(!store.cancel("task_missing").await);

        let running = seeded(&store, "p1").await;
        store.update(&running.id, TaskUpdate::running()).await.unwrap();
        assert!(store.cancel(&running.id).await);

        let done = seeded(&store, "p1").await;
        store.update(&done.id, TaskUpdate::running()).await.unwrap();
        store
            .update(&done.id, TaskUpdate::completed(json!({"ok": true})))
            .await
            .unwrap();
        assert!(!store.cancel(&done.id).await);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_terminal_tasks() {
        let store = InMemoryTaskStore::new();
        let long_ago = Utc::now() - chrono::Duration::hours(2);

        let expired = seeded(&store, "p1").await;
        store.update(&expired.id, TaskUpdate::running()).await.unwrap();
        store
            .update(
                &expired.id,
                TaskUpdate::failed("boom").with_completed_at(long_ago),
            )
            .await
            .unwrap();

        let fresh = seeded(&store, "p1").await;
        store.cancel(&fresh.id).await;

        let pending = seeded(&store, "p1").await;

        assert_eq!(store.sweep().await, 1);
        assert!(store.get(&expired.id).await.is_none());
        assert!(store.get(&fresh.id).await.is_some());
        assert!(store.get(&pending.id).await.is_some());
    }

    #[tokio::test]
    async fn test_custom_retention() {
        let store = InMemoryTaskStore::new().with_retention(Duration::ZERO);
        let task = seeded(&store, "p1").await;
        store.cancel(&task.id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.sweep().await, 1);
        assert!(store.is_empty());
    }
}
