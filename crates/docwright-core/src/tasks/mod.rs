//! Queued tasks: types, producer, and queue clients.
//!
//! A [`QueuedTask`] is the unit of work handed to the external at-least-once
//! queue. Routing metadata travels in [`TaskHeaders`], not the payload, so
//! the consumer can re-derive the routing key and resolve credentials
//! without deserializing the payload first. The original webhook signature
//! is deliberately *not* carried: the queue transport is already trusted,
//! and downstream re-verification would require persisting the secret-bound
//! raw bytes.

pub mod consumer;
pub mod http_queue;

pub use consumer::{ConsumeOutcome, TaskConsumer};
pub use http_queue::HttpTaskQueue;

use crate::error::{EnqueueError, ValidationError};
use crate::webhook::RoutingKey;
use crate::{DeliveryId, InstallationId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Queue-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header names used when the queue delivers a task over HTTP.
pub const TASK_DELIVERY_ID_HEADER: &str = "x-docwright-delivery-id";
pub const TASK_EVENT_TYPE_HEADER: &str = "x-docwright-event";
pub const TASK_ACTION_HEADER: &str = "x-docwright-action";
pub const TASK_INSTALLATION_ID_HEADER: &str = "x-docwright-installation-id";

/// Routing metadata carried alongside a task payload.
///
/// Must contain enough for the consumer to re-resolve both the handler (via
/// the routing key derivation) and an authenticated client (via the
/// installation id) without any round trip to the original sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHeaders {
    pub delivery_id: DeliveryId,
    pub event_type: String,
    pub action: Option<String>,
    pub installation_id: Option<InstallationId>,
}

impl TaskHeaders {
    /// Derive the routing key. Identical derivation to the webhook receiver;
    /// the key is never passed through the queue as an opaque string.
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(&self.event_type, self.action.as_deref())
    }

    /// Reconstruct task headers from the HTTP headers of a queue delivery.
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let delivery_id = headers
            .get(TASK_DELIVERY_ID_HEADER)
            .ok_or_else(|| ValidationError::Required {
                field: TASK_DELIVERY_ID_HEADER.to_string(),
            })?;

        let event_type = headers
            .get(TASK_EVENT_TYPE_HEADER)
            .ok_or_else(|| ValidationError::Required {
                field: TASK_EVENT_TYPE_HEADER.to_string(),
            })?;

        let action = headers.get(TASK_ACTION_HEADER).cloned();

        let installation_id = match headers.get(TASK_INSTALLATION_ID_HEADER) {
            Some(raw) => {
                let id = raw
                    .parse::<InstallationId>()
                    .map_err(|_| ValidationError::InvalidFormat {
                        field: TASK_INSTALLATION_ID_HEADER.to_string(),
                        message: "must be an unsigned integer".to_string(),
                    })?;
                Some(id)
            }
            None => None,
        };

        Ok(Self {
            delivery_id: DeliveryId::new(delivery_id.clone()),
            event_type: event_type.clone(),
            action,
            installation_id,
        })
    }
}

/// The unit of work placed on the external queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// Which processing endpoint should consume this task.
    pub target_path: String,

    /// Intended consuming service, used by the queue for auth.
    pub audience: String,

    /// Routing metadata; see [`TaskHeaders`].
    pub headers: TaskHeaders,

    /// The verified event body, or a cron-constructed equivalent.
    pub payload: serde_json::Value,
}

/// External task queue client.
///
/// The queue is an external at-least-once service; this trait covers only
/// task submission. Delivery, retry, and backoff policy are owned by the
/// queue infrastructure.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: QueuedTask) -> Result<TaskId, EnqueueError>;
}

/// In-memory [`TaskQueue`] for tests and local development.
///
/// Records every submitted task; nothing is ever delivered.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<Vec<QueuedTask>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far.
    pub async fn enqueued(&self) -> Vec<QueuedTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: QueuedTask) -> Result<TaskId, EnqueueError> {
        let mut tasks = self.tasks.lock().await;
        tasks.push(task);
        Ok(TaskId::new(uuid::Uuid::new_v4().to_string()))
    }
}

/// Wraps the queue client with the service's fixed target path and audience.
///
/// Both the webhook receiver and the cron dispatcher produce tasks through
/// this type, so every task lands on the same consumer endpoint with the
/// same shape.
pub struct TaskProducer {
    queue: Arc<dyn TaskQueue>,
    target_path: String,
    audience: String,
}

impl TaskProducer {
    pub fn new(queue: Arc<dyn TaskQueue>, target_path: String, audience: String) -> Self {
        Self {
            queue,
            target_path,
            audience,
        }
    }

    /// Submit one event for asynchronous processing.
    pub async fn enqueue_event(
        &self,
        headers: TaskHeaders,
        payload: serde_json::Value,
    ) -> Result<TaskId, EnqueueError> {
        let task = QueuedTask {
            target_path: self.target_path.clone(),
            audience: self.audience.clone(),
            headers,
            payload,
        };

        let task_id = self.queue.enqueue(task).await?;
        debug!(task_id = %task_id, "Task submitted to queue");
        Ok(task_id)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
