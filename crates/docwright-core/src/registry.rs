//! Handler registry: routing keys mapped to event handlers.
//!
//! The registry is an immutable map built once at startup through
//! [`RegistryBuilder`]. Registration is never driven by request data, so an
//! attacker-controlled event type can only ever *look up* a key that was
//! registered at compile-time call sites; it can never index into arbitrary
//! callables. A lookup miss means "this event is not interesting" and is
//! handled by acknowledging the delivery without further work.

use crate::error::HandlerError;
use crate::webhook::{EventEnvelope, RoutingKey};
use crate::DeliveryId;
use async_trait::async_trait;
use docwright_github::InstallationClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a handler receives besides the event itself.
pub struct HandlerContext {
    /// Client authenticated as the installation the event concerns.
    pub client: Arc<InstallationClient>,

    /// Delivery id for log correlation.
    pub delivery_id: DeliveryId,
}

/// A business-logic handler for one routing key.
///
/// Handlers run inside the task consumer, after the queue has delivered the
/// task. They must tolerate out-of-order and duplicate delivery: the queue
/// is at-least-once and provides no ordering between events, so a handler
/// that needs current state must fetch it through the client rather than
/// trust the event sequence.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Process one event. Errors propagate to the queue's retry mechanism.
    async fn handle(&self, event: &EventEnvelope, ctx: HandlerContext)
        -> Result<(), HandlerError>;
}

/// Builder for the process-lifetime handler registry.
///
/// Called only during startup; registering the same key twice overwrites
/// the earlier handler and logs a WARN, since a duplicate registration is
/// almost always a wiring mistake.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<RoutingKey, Arc<dyn EventHandler>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, key: RoutingKey, handler: Arc<dyn EventHandler>) -> Self {
        if let Some(previous) = self.entries.insert(key.clone(), handler) {
            warn!(
                routing_key = %key,
                previous_handler = previous.name(),
                "Handler registration overwrote an existing entry"
            );
        }
        self
    }

    pub fn build(self) -> HandlerRegistry {
        let mut keys: Vec<&str> = self.entries.keys().map(RoutingKey::as_str).collect();
        keys.sort_unstable();
        info!(routing_keys = ?keys, "Handler registry built");

        HandlerRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable routing-key to handler mapping.
pub struct HandlerRegistry {
    entries: HashMap<RoutingKey, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// O(1) handler lookup. `None` is not an error; it means no business
    /// logic cares about this event.
    pub fn lookup(&self, key: &RoutingKey) -> Option<Arc<dyn EventHandler>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &RoutingKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.entries.keys().map(RoutingKey::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("routing_keys", &keys)
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
