//! Queue-invoked task consumption.
//!
//! The consumer is called by the queue infrastructure, not by the original
//! webhook sender, so the platform signature is not re-checked here; the
//! queue transport is trusted. The consumer re-derives the routing key from
//! the task headers with the same derivation the receiver used, resolves an
//! installation client through the cache, and invokes the handler. Handler
//! errors propagate out as a non-2xx response, which the queue interprets
//! as "retry me"; the consumer itself implements no retry or backoff.

use crate::error::DispatchError;
use crate::registry::{HandlerContext, HandlerRegistry};
use crate::tasks::TaskHeaders;
use crate::webhook::{EventEnvelope, RoutingKey};
use docwright_github::InstallationClientProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of consuming one delivered task.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// A handler processed the event.
    Handled { routing_key: RoutingKey },

    /// No handler is registered for the routing key. Acknowledged so the
    /// queue does not redeliver; this should not normally occur because the
    /// receiver filters unrouted events before enqueueing.
    Skipped { routing_key: RoutingKey },
}

/// Processes tasks delivered by the queue.
pub struct TaskConsumer {
    registry: Arc<HandlerRegistry>,
    clients: Arc<dyn InstallationClientProvider>,
}

impl TaskConsumer {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        clients: Arc<dyn InstallationClientProvider>,
    ) -> Self {
        Self { registry, clients }
    }

    /// Consume one delivered task.
    ///
    /// # Errors
    ///
    /// Any error returned here must surface as a non-2xx response from the
    /// consumer endpoint so the queue redelivers the task.
    pub async fn process(
        &self,
        headers: TaskHeaders,
        payload: serde_json::Value,
    ) -> Result<ConsumeOutcome, DispatchError> {
        let routing_key = headers.routing_key();

        let handler = match self.registry.lookup(&routing_key) {
            Some(handler) => handler,
            None => {
                // Defensive: the receiver already filters these.
                warn!(
                    delivery_id = %headers.delivery_id,
                    routing_key = %routing_key,
                    "Task delivered for routing key with no handler; acknowledging"
                );
                return Ok(ConsumeOutcome::Skipped { routing_key });
            }
        };

        let installation_id =
            headers
                .installation_id
                .ok_or_else(|| DispatchError::MissingInstallation {
                    routing_key: routing_key.as_str().to_string(),
                })?;

        let client = self.clients.client_for(installation_id).await?;

        let envelope = EventEnvelope {
            delivery_id: headers.delivery_id.clone(),
            event_type: headers.event_type,
            action: headers.action,
            installation_id: Some(installation_id),
            payload,
        };

        let ctx = HandlerContext {
            client,
            delivery_id: headers.delivery_id.clone(),
        };

        handler.handle(&envelope, ctx).await?;

        info!(
            delivery_id = %headers.delivery_id,
            routing_key = %routing_key,
            handler = handler.name(),
            "Task processed"
        );

        Ok(ConsumeOutcome::Handled { routing_key })
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
