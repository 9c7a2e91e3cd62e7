//! # Docwright Core
//!
//! Event ingestion, verification, routing, and async dispatch pipeline.
//!
//! Docwright reacts to GitHub events (pushes, merged pull requests,
//! installation changes) by regenerating documentation for the affected
//! repositories. Nothing interesting happens on the request thread: the
//! webhook endpoint verifies and routes, then hands the event to an external
//! at-least-once task queue. A queue-invoked consumer endpoint performs the
//! actual work with an installation-scoped GitHub client.
//!
//! Data flow:
//!
//! ```text
//! GitHub -> webhook receiver -> (signature check, registry lookup)
//!        -> task producer -> [queue] -> task consumer
//!        -> (installation client cache) -> event handler
//! ```
//!
//! The cron dispatcher joins the pipe at the task producer: on each tick it
//! enumerates feature-enabled repositories from the backing store and
//! enqueues one refresh task per repository.
//!
//! ## Module Organization
//!
//! - [`webhook`] - Envelope extraction, signature verification, receiver
//! - [`registry`] - Routing keys mapped to event handlers
//! - [`tasks`] - Queued task types, producer, consumer, queue clients
//! - [`cron`] - Periodic re-enumeration of eligible repositories
//! - [`store`] - Backing-store queries for eligible work items
//! - [`error`] - Error taxonomy for the pipeline

pub mod cron;
pub mod error;
pub mod registry;
pub mod store;
pub mod tasks;
pub mod webhook;

// Re-export commonly used types at crate root for convenience
pub use cron::{CronDispatcher, CronRunSummary, DOCS_REFRESH_EVENT};
pub use docwright_github::InstallationId;
pub use error::{
    CronError, DispatchError, DocwrightError, EnqueueError, HandlerError, SignatureError,
    StoreError, ValidationError,
};
pub use registry::{EventHandler, HandlerContext, HandlerRegistry, RegistryBuilder};
pub use store::{EligibleWorkItem, HttpWorkItemStore, WorkItemStore};
pub use tasks::{
    ConsumeOutcome, HttpTaskQueue, InMemoryTaskQueue, QueuedTask, TaskConsumer, TaskHeaders,
    TaskId, TaskProducer, TaskQueue,
};
pub use webhook::{
    EventEnvelope, RoutingKey, SecretProvider, SignatureVerifier, StaticSecretProvider,
    WebhookHeaders, WebhookOutcome, WebhookReceiver, WebhookRequest,
};

use serde::{Deserialize, Serialize};

/// Opaque delivery identifier supplied by the sender.
///
/// GitHub assigns one per webhook delivery; cron-constructed tasks generate
/// their own so every task carries a correlation id for logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(String);

impl DeliveryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh delivery id for internally constructed events.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a repository by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
