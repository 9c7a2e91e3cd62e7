//! Tests for the task consumer.

use super::*;
use crate::error::HandlerError;
use crate::registry::{EventHandler, RegistryBuilder};
use crate::DeliveryId;
use async_trait::async_trait;
use chrono::Utc;
use docwright_github::{AuthError, InstallationClient, InstallationId, InstallationToken};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Fakes
// ============================================================================

/// Client provider that builds offline clients and counts resolutions.
struct FakeClientProvider {
    resolutions: AtomicUsize,
}

impl FakeClientProvider {
    fn new() -> Self {
        Self {
            resolutions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InstallationClientProvider for FakeClientProvider {
    async fn client_for(
        &self,
        installation_id: InstallationId,
    ) -> Result<Arc<InstallationClient>, AuthError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        let token = InstallationToken::new(
            "ghs_fake".to_string(),
            installation_id,
            Utc::now() + chrono::Duration::hours(1),
        );
        Ok(Arc::new(InstallationClient::new(
            reqwest::Client::new(),
            "https://api.github.invalid".to_string(),
            token,
        )))
    }
}

struct FailingClientProvider;

#[async_trait]
impl InstallationClientProvider for FailingClientProvider {
    async fn client_for(
        &self,
        _installation_id: InstallationId,
    ) -> Result<Arc<InstallationClient>, AuthError> {
        Err(AuthError::TokenExchange {
            status: 401,
            message: "bad credentials".to_string(),
        })
    }
}

/// Handler that records what it was invoked with.
struct RecordingHandler {
    invocations: Mutex<Vec<(String, Option<InstallationId>)>>,
    fail: bool,
}

impl RecordingHandler {
    fn new(fail: bool) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            fail,
        }
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(
        &self,
        event: &EventEnvelope,
        ctx: HandlerContext,
    ) -> Result<(), HandlerError> {
        self.invocations.lock().unwrap().push((
            event.routing_key().as_str().to_string(),
            Some(ctx.client.installation_id()),
        ));
        if self.fail {
            return Err(HandlerError::Failed {
                message: "simulated handler failure".to_string(),
            });
        }
        Ok(())
    }
}

fn headers(event_type: &str, action: Option<&str>, installation: Option<u64>) -> TaskHeaders {
    TaskHeaders {
        delivery_id: DeliveryId::new("d-1"),
        event_type: event_type.to_string(),
        action: action.map(str::to_string),
        installation_id: installation.map(InstallationId::new),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_consumer_routes_to_handler_with_resolved_client() {
    let handler = Arc::new(RecordingHandler::new(false));
    let registry = Arc::new(
        RegistryBuilder::new()
            .register(RoutingKey::new("push", None), handler.clone())
            .build(),
    );
    let provider = Arc::new(FakeClientProvider::new());
    let consumer = TaskConsumer::new(registry, provider.clone());

    let outcome = consumer
        .process(headers("push", None, Some(42)), json!({"ref": "refs/heads/main"}))
        .await
        .expect("processing should succeed");

    assert!(matches!(outcome, ConsumeOutcome::Handled { .. }));
    assert_eq!(provider.resolutions.load(Ordering::SeqCst), 1);

    let invocations = handler.invocations.lock().unwrap();
    assert_eq!(
        invocations.as_slice(),
        &[("push".to_string(), Some(InstallationId::new(42)))]
    );
}

#[tokio::test]
async fn test_consumer_rederives_routing_key_from_headers() {
    let handler = Arc::new(RecordingHandler::new(false));
    let registry = Arc::new(
        RegistryBuilder::new()
            .register(RoutingKey::new("pull_request", Some("closed")), handler.clone())
            .build(),
    );
    let consumer = TaskConsumer::new(registry, Arc::new(FakeClientProvider::new()));

    consumer
        .process(
            headers("pull_request", Some("closed"), Some(7)),
            json!({"pull_request": {"merged": true}}),
        )
        .await
        .expect("processing should succeed");

    let invocations = handler.invocations.lock().unwrap();
    assert_eq!(invocations[0].0, "pull_request.closed");
}

#[tokio::test]
async fn test_no_handler_acknowledges_without_invocation() {
    let registry = Arc::new(RegistryBuilder::new().build());
    let provider = Arc::new(FakeClientProvider::new());
    let consumer = TaskConsumer::new(registry, provider.clone());

    let outcome = consumer
        .process(headers("milestone", Some("created"), Some(42)), json!({}))
        .await
        .expect("skip is not an error");

    assert!(matches!(outcome, ConsumeOutcome::Skipped { .. }));
    // No client resolution for skipped events.
    assert_eq!(provider.resolutions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_failure_propagates_for_queue_retry() {
    let handler = Arc::new(RecordingHandler::new(true));
    let registry = Arc::new(
        RegistryBuilder::new()
            .register(RoutingKey::new("push", None), handler)
            .build(),
    );
    let consumer = TaskConsumer::new(registry, Arc::new(FakeClientProvider::new()));

    let result = consumer
        .process(headers("push", None, Some(42)), json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::Handler(_))));
}

#[tokio::test]
async fn test_missing_installation_id_is_a_dispatch_error() {
    let registry = Arc::new(
        RegistryBuilder::new()
            .register(
                RoutingKey::new("push", None),
                Arc::new(RecordingHandler::new(false)),
            )
            .build(),
    );
    let consumer = TaskConsumer::new(registry, Arc::new(FakeClientProvider::new()));

    let result = consumer.process(headers("push", None, None), json!({})).await;

    assert!(matches!(
        result,
        Err(DispatchError::MissingInstallation { .. })
    ));
}

#[tokio::test]
async fn test_client_resolution_failure_propagates() {
    let registry = Arc::new(
        RegistryBuilder::new()
            .register(
                RoutingKey::new("push", None),
                Arc::new(RecordingHandler::new(false)),
            )
            .build(),
    );
    let consumer = TaskConsumer::new(registry, Arc::new(FailingClientProvider));

    let result = consumer
        .process(headers("push", None, Some(42)), json!({}))
        .await;

    assert!(matches!(result, Err(DispatchError::Auth(_))));
}
