//! Single-key task queue
//!
//! Producers `LPUSH` a JSON envelope, the worker `BRPOP`s it with a timeout,
//! so the list drains oldest-first. No retry, dedup, or acknowledgement.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::Notify;

use crate::models::Task;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Task encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Push a raw envelope onto the head of the list.
    async fn push(&self, raw: String) -> Result<(), QueueError>;

    /// Pop from the tail, waiting up to `timeout`. `Ok(None)` on timeout.
    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError>;

    fn name(&self) -> &str;
}

/// Serialize `task` and push it.
pub async fn enqueue_task(queue: &dyn TaskQueue, task: &Task) -> Result<(), QueueError> {
    let raw = serde_json::to_string(task)?;
    queue.push(raw).await?;
    tracing::debug!(task = task.kind(), note_id = %task.note_id(), queue = queue.name(), "Enqueued task");
    Ok(())
}

// ============================================================================
// Redis
// ============================================================================

pub struct RedisTaskQueue {
    push_conn: ConnectionManager,
    pop_conn: ConnectionManager,
    key: String,
}

impl RedisTaskQueue {
    /// Open two managed connections: `BRPOP` blocks its connection, so pushes
    /// from request handlers go through the other one.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let endpoint = redis_endpoint(&client);
        let push_conn = ConnectionManager::new(client.clone()).await?;
        let pop_conn = ConnectionManager::new(client).await?;

        tracing::info!(endpoint = %endpoint, "Redis task queue connected");

        Ok(Self {
            push_conn,
            pop_conn,
            key: key.into(),
        })
    }
}

/// `host:port` (or socket path) of a client, without credentials.
fn redis_endpoint(client: &redis::Client) -> String {
    client.get_connection_info().addr.to_string()
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn push(&self, raw: String) -> Result<(), QueueError> {
        let mut conn = self.push_conn.clone();
        conn.lpush::<_, _, ()>(&self.key, raw).await?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.pop_conn.clone();
        let popped: Option<(String, String)> =
            conn.brpop(&self.key, timeout.as_secs_f64()).await?;
        Ok(popped.map(|(_, raw)| raw))
    }

    fn name(&self) -> &str {
        "redis"
    }
}

// ============================================================================
// In-process
// ============================================================================

/// Same list semantics as the Redis queue, held in memory.
#[derive(Default)]
pub struct MemoryTaskQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_pop(&self) -> Option<String> {
        self.items.lock().ok().and_then(|mut q| q.pop_back())
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn push(&self, raw: String) -> Result<(), QueueError> {
        if let Ok(mut q) = self.items.lock() {
            q.push_front(raw);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(raw) = self.try_pop() {
                return Ok(Some(raw));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.try_pop());
            }
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn test_redis_endpoint_hides_credentials() {
        let client = redis::Client::open("redis://:hunter2@127.0.0.1:6379/0").unwrap();
        let endpoint = redis_endpoint(&client);
        assert!(endpoint.contains("127.0.0.1"));
        assert!(endpoint.contains("6379"));
        assert!(!endpoint.contains("hunter2"));
        assert!(!endpoint.contains('*'));
    }

    #[tokio::test]
    async fn test_memory_queue_is_fifo() {
        let queue = MemoryTaskQueue::new();
        queue.push("first".to_string()).await.unwrap();
        queue.push("second".to_string()).await.unwrap();

        let timeout = Duration::from_millis(10);
        assert_eq!(queue.pop(timeout).await.unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop(timeout).await.unwrap().as_deref(), Some("second"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_memory_queue_pop_times_out() {
        let queue = MemoryTaskQueue::new();
        let popped = queue.pop(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_memory_queue_wakes_blocked_pop() {
        let queue = Arc::new(MemoryTaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push("late".to_string()).await.unwrap();

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_enqueue_task_writes_envelope() {
        let queue = MemoryTaskQueue::new();
        let note_id = Uuid::new_v4();
        enqueue_task(&queue, &Task::ProcessNote { note_id }).await.unwrap();

        let raw = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "process_note");
        assert_eq!(value["payload"]["note_id"], note_id.to_string());
    }
}
