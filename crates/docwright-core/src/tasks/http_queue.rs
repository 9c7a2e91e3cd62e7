//! HTTP client for the external task queue's enqueue API.

use crate::error::EnqueueError;
use crate::tasks::{QueuedTask, TaskId, TaskQueue};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct EnqueueResponse {
    id: String,
}

/// Production [`TaskQueue`] that submits tasks to the queue service over
/// HTTP.
///
/// The queue service later delivers each task by POSTing to the task's
/// `target_path` with the routing metadata mapped onto HTTP headers; that
/// delivery side is handled by the task consumer endpoint, not here.
pub struct HttpTaskQueue {
    http: reqwest::Client,
    enqueue_url: String,
}

impl HttpTaskQueue {
    /// # Arguments
    ///
    /// * `enqueue_url` - Full URL of the queue service's task-creation API.
    pub fn new(http: reqwest::Client, enqueue_url: String) -> Self {
        Self { http, enqueue_url }
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn enqueue(&self, task: QueuedTask) -> Result<TaskId, EnqueueError> {
        let response = self
            .http
            .post(&self.enqueue_url)
            .json(&task)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EnqueueError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: EnqueueResponse =
            response
                .json()
                .await
                .map_err(|e| EnqueueError::Rejected {
                    status: status.as_u16(),
                    message: format!("enqueue response could not be decoded: {}", e),
                })?;

        debug!(task_id = %body.id, "Queue service accepted task");
        Ok(TaskId::new(body.id))
    }
}

impl std::fmt::Debug for HttpTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTaskQueue")
            .field("enqueue_url", &self.enqueue_url)
            .finish()
    }
}
