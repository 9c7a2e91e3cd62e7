//! Tests for the handler registry.

use super::*;
use crate::error::HandlerError;
use crate::webhook::EventEnvelope;

struct NamedHandler(&'static str);

#[async_trait]
impl EventHandler for NamedHandler {
    fn name(&self) -> &'static str {
        self.0
    }

    async fn handle(
        &self,
        _event: &EventEnvelope,
        _ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[test]
fn test_lookup_finds_registered_handler() {
    let registry = RegistryBuilder::new()
        .register(RoutingKey::new("push", None), Arc::new(NamedHandler("push")))
        .register(
            RoutingKey::new("pull_request", Some("closed")),
            Arc::new(NamedHandler("pr-closed")),
        )
        .build();

    let handler = registry
        .lookup(&RoutingKey::new("pull_request", Some("closed")))
        .expect("handler should be registered");
    assert_eq!(handler.name(), "pr-closed");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_lookup_miss_returns_none() {
    let registry = RegistryBuilder::new()
        .register(RoutingKey::new("push", None), Arc::new(NamedHandler("push")))
        .build();

    assert!(registry
        .lookup(&RoutingKey::new("milestone", Some("created")))
        .is_none());
    assert!(!registry.contains(&RoutingKey::new("milestone", Some("created"))));
}

#[test]
fn test_duplicate_registration_overwrites() {
    let registry = RegistryBuilder::new()
        .register(
            RoutingKey::new("push", None),
            Arc::new(NamedHandler("first")),
        )
        .register(
            RoutingKey::new("push", None),
            Arc::new(NamedHandler("second")),
        )
        .build();

    let handler = registry
        .lookup(&RoutingKey::new("push", None))
        .expect("handler should be registered");
    assert_eq!(handler.name(), "second");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_empty_registry() {
    let registry = RegistryBuilder::new().build();
    assert!(registry.is_empty());
    assert!(registry.lookup(&RoutingKey::new("push", None)).is_none());
}

#[test]
fn test_debug_lists_routing_keys_sorted() {
    let registry = RegistryBuilder::new()
        .register(RoutingKey::new("push", None), Arc::new(NamedHandler("a")))
        .register(
            RoutingKey::new("docs_refresh", None),
            Arc::new(NamedHandler("b")),
        )
        .build();

    let debug = format!("{:?}", registry);
    assert!(debug.contains("docs_refresh"));
    assert!(debug.contains("push"));
}
