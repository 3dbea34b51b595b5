//! Shared fixtures: scripted upstreams and queue builders.

#![allow(dead_code)]

use async_trait::async_trait;
use genai::DefaultPromptBuilder;
use orchestrator::{
    ExecutionEngine, ExecutorRegistry, InMemoryTaskStore, Task, TaskQueue, TaskStatus, TaskStore,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use utils::{HttpReply, OutboundRequest, ResilientClient, RetryPolicy, Transport, TransportError};

pub const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Replays canned replies in order and records every request. The last reply
/// repeats once the script runs out.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<(u16, Value)>>,
    last: Mutex<Option<(u16, Value)>>,
    pub seen: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<(u16, Value)>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest, _timeout: Duration) -> Result<HttpReply, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let (status, body) = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or((500, json!({"error": "script exhausted"}))),
        };
        Ok(HttpReply::new(status, body.to_string()))
    }
}

/// Never answers.
pub struct HangingTransport {
    pub calls: Mutex<usize>,
}

impl HangingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: &OutboundRequest, _timeout: Duration) -> Result<HttpReply, TransportError> {
        *self.calls.lock().unwrap() += 1;
        std::future::pending().await
    }
}

pub fn client(transport: Arc<dyn Transport>) -> Arc<ResilientClient> {
    Arc::new(ResilientClient::new(transport, RetryPolicy::default()))
}

pub fn queue_with(registry: ExecutorRegistry, client: Arc<ResilientClient>) -> TaskQueue {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let engine = ExecutionEngine::new(store.clone(), Arc::new(registry), client);
    TaskQueue::new(store, Arc::new(engine))
}

/// Queue with the built-in executors talking to `transport`.
pub fn builtin_queue(transport: Arc<dyn Transport>) -> TaskQueue {
    queue_with(
        ExecutorRegistry::builtin(Arc::new(DefaultPromptBuilder::new())),
        client(transport),
    )
}

pub fn text_config() -> Value {
    json!({"type": "openai", "apiUrl": "https://api.test/v1", "apiKey": "sk-test", "model": "gpt-4o"})
}

pub fn image_config() -> Value {
    json!({"type": "volcengine", "apiUrl": "https://ark.test/api/v3", "apiKey": "sk-volc", "model": "seedream"})
}

pub fn chat_reply(content: &str) -> Value {
    json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
}

pub fn image_reply() -> Value {
    json!({"created": 1, "data": [{"b64_json": PIXEL}]})
}

/// Yield until the task is terminal.
pub async fn wait_terminal(queue: &TaskQueue, id: &str) -> Task {
    for _ in 0..10_000 {
        let task = queue.get(id).await.expect("task exists");
        if task.status.is_terminal() {
            return task;
        }
        tokio::task::yield_now().await;
    }
    panic!("task {id} never reached a terminal state");
}

/// Yield until the task reports at least `progress`.
pub async fn wait_progress(queue: &TaskQueue, id: &str, progress: u8) -> Task {
    for _ in 0..10_000 {
        let task = queue.get(id).await.expect("task exists");
        if task.progress >= progress || task.status == TaskStatus::Failed {
            return task;
        }
        tokio::task::yield_now().await;
    }
    panic!("task {id} never reached progress {progress}");
}
