//! Tests for the HTTP surface: routing, status mapping, and the cron
//! shared-secret check.

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use chrono::Utc;
use docwright_core::store::{EligibleWorkItem, WorkItemStore};
use docwright_core::tasks::{
    TaskProducer, TaskQueue, TASK_DELIVERY_ID_HEADER, TASK_EVENT_TYPE_HEADER,
    TASK_INSTALLATION_ID_HEADER,
};
use docwright_core::webhook::{
    StaticSecretProvider, DELIVERY_ID_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER,
};
use docwright_core::{InMemoryTaskQueue, RepositoryRef, SignatureVerifier, StoreError};
use docwright_github::{
    AuthError, InstallationClient, InstallationClientProvider, InstallationId, InstallationToken,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tower::ServiceExt;

const SECRET: &str = "test-webhook-secret";
const CRON_SECRET: &str = "test-cron-secret";

// ============================================================================
// Fakes and harness
// ============================================================================

struct FakeClientProvider;

#[async_trait::async_trait]
impl InstallationClientProvider for FakeClientProvider {
    async fn client_for(
        &self,
        installation_id: InstallationId,
    ) -> Result<Arc<InstallationClient>, AuthError> {
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

struct FixedStore {
    items: Vec<EligibleWorkItem>,
}

#[async_trait::async_trait]
impl WorkItemStore for FixedStore {
    async fn repositories_with_feature(
        &self,
        _feature: &str,
    ) -> Result<Vec<EligibleWorkItem>, StoreError> {
        Ok(self.items.clone())
    }
}

struct RejectingQueue;

#[async_trait::async_trait]
impl TaskQueue for RejectingQueue {
    async fn enqueue(
        &self,
        _task: docwright_core::QueuedTask,
    ) -> Result<docwright_core::TaskId, docwright_core::EnqueueError> {
        Err(docwright_core::EnqueueError::Rejected {
            status: 503,
            message: "queue full".to_string(),
        })
    }
}

struct TestHarness {
    router: Router,
    queue: Arc<InMemoryTaskQueue>,
    config: Arc<ServiceConfig>,
    metrics: Arc<ServiceMetrics>,
}

fn harness_with_items(items: Vec<EligibleWorkItem>) -> TestHarness {
    let queue = Arc::new(InMemoryTaskQueue::new());
    build_harness(Arc::clone(&queue) as Arc<dyn TaskQueue>, queue, items)
}

fn build_harness(
    task_queue: Arc<dyn TaskQueue>,
    queue: Arc<InMemoryTaskQueue>,
    items: Vec<EligibleWorkItem>,
) -> TestHarness {
    let mut config = ServiceConfig::default();
    config.webhooks.secret = SECRET.to_string();
    config.cron.shared_secret = CRON_SECRET.to_string();
    let config = Arc::new(config);

    let producer = Arc::new(TaskProducer::new(
        task_queue,
        config.queue.target_path.clone(),
        config.queue.audience.clone(),
    ));
    let registry = Arc::new(build_registry());

    let verifier = SignatureVerifier::new(Arc::new(StaticSecretProvider::new(SECRET.to_string())));
    let receiver = Arc::new(WebhookReceiver::new(
        verifier,
        Arc::clone(&registry),
        Arc::clone(&producer),
        false,
    ));

    let consumer = Arc::new(TaskConsumer::new(registry, Arc::new(FakeClientProvider)));
    let cron = Arc::new(CronDispatcher::new(
        Arc::new(FixedStore { items }),
        producer,
        config.cron.feature.clone(),
    ));

    let metrics = Arc::new(ServiceMetrics::new().expect("metrics should build"));

    let state = AppState {
        config: Arc::clone(&config),
        receiver,
        consumer,
        cron,
        metrics: Arc::clone(&metrics),
    };

    TestHarness {
        router: create_router(state),
        queue,
        config,
        metrics,
    }
}

fn harness() -> TestHarness {
    harness_with_items(Vec::new())
}

/// Harness whose task queue rejects every enqueue; the in-memory queue is
/// present only to satisfy the harness shape and stays empty.
fn failing_queue_harness() -> TestHarness {
    build_harness(
        Arc::new(RejectingQueue),
        Arc::new(InMemoryTaskQueue::new()),
        Vec::new(),
    )
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn webhook_request(event_type: &str, signature: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header(DELIVERY_ID_HEADER, "delivery-1")
        .header(EVENT_TYPE_HEADER, event_type)
        .header(SIGNATURE_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_healthy() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let text = String::from_utf8(bytes.to_vec()).expect("exposition is UTF-8");
    assert!(text.contains("docwright_webhooks_received_total"));
}

// ============================================================================
// Webhook intake
// ============================================================================

#[tokio::test]
async fn test_signed_push_webhook_is_accepted_and_enqueued() {
    let harness = harness();
    let body = r#"{"ref":"refs/heads/main","installation":{"id":42}}"#;

    let response = harness
        .router
        .oneshot(webhook_request("push", &sign(SECRET, body.as_bytes()), body))
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["routing_key"], "push");

    let tasks = harness.queue.enqueued().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(
        tasks[0].headers.installation_id,
        Some(InstallationId::new(42))
    );
    assert_eq!(tasks[0].target_path, harness.config.queue.target_path);
}

#[tokio::test]
async fn test_invalid_signature_rejected_with_400_and_no_task() {
    let harness = harness();
    let body = r#"{"ref":"refs/heads/main","installation":{"id":42}}"#;

    let response = harness
        .router
        .oneshot(webhook_request(
            "push",
            &sign("wrong-secret", body.as_bytes()),
            body,
        ))
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.queue.is_empty().await);
}

#[tokio::test]
async fn test_enqueue_failure_returns_500_and_counts_as_failed() {
    let harness = failing_queue_harness();
    let body = r#"{"ref":"refs/heads/main","installation":{"id":42}}"#;

    let response = harness
        .router
        .oneshot(webhook_request("push", &sign(SECRET, body.as_bytes()), body))
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.metrics.webhooks_failed_total.get(), 1);
    assert_eq!(harness.metrics.webhooks_accepted_total.get(), 0);
}

#[tokio::test]
async fn test_unrouted_event_acknowledged_without_enqueue() {
    let harness = harness();
    let body = r#"{"action":"created","installation":{"id":42}}"#;

    let response = harness
        .router
        .oneshot(webhook_request(
            "milestone",
            &sign(SECRET, body.as_bytes()),
            body,
        ))
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ignored");
    assert!(harness.queue.is_empty().await);
}

// ============================================================================
// Task consumption
// ============================================================================

#[tokio::test]
async fn test_task_delivery_is_processed() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/tasks/process")
                .header(TASK_DELIVERY_ID_HEADER, "delivery-1")
                .header(TASK_EVENT_TYPE_HEADER, "push")
                .header(TASK_INSTALLATION_ID_HEADER, "42")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"ref":"refs/heads/main"}"#))
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "handled");
    assert_eq!(json["routing_key"], "push");
}

#[tokio::test]
async fn test_task_delivery_without_headers_is_bad_request() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/tasks/process")
                .body(Body::from("{}"))
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_with_invalid_json_payload_is_bad_request() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/tasks/process")
                .header(TASK_DELIVERY_ID_HEADER, "delivery-1")
                .header(TASK_EVENT_TYPE_HEADER, "push")
                .header(TASK_INSTALLATION_ID_HEADER, "42")
                .body(Body::from("not json at all"))
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_without_installation_id_is_bad_request() {
    let harness = harness();

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/tasks/process")
                .header(TASK_DELIVERY_ID_HEADER, "delivery-1")
                .header(TASK_EVENT_TYPE_HEADER, "push")
                .body(Body::from("{}"))
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Cron trigger
// ============================================================================

fn work_item(owner: &str, name: &str, installation: u64) -> EligibleWorkItem {
    EligibleWorkItem {
        team_id: "team-1".to_string(),
        repository: RepositoryRef::new(owner, name),
        installation_id: InstallationId::new(installation),
    }
}

#[tokio::test]
async fn test_cron_with_wrong_secret_is_unauthorized() {
    let harness = harness_with_items(vec![work_item("acme", "docs", 42)]);

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/cron/docs-refresh")
                .header(CRON_SECRET_HEADER, "wrong")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.queue.is_empty().await);
}

#[tokio::test]
async fn test_cron_without_secret_header_is_unauthorized() {
    let harness = harness_with_items(vec![work_item("acme", "docs", 42)]);

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/cron/docs-refresh")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(harness.queue.is_empty().await);
}

#[tokio::test]
async fn test_cron_with_correct_secret_dispatches_tasks() {
    let harness = harness_with_items(vec![
        work_item("acme", "docs", 42),
        work_item("acme", "handbook", 42),
    ]);

    let response = harness
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/internal/cron/docs-refresh")
                .header(CRON_SECRET_HEADER, CRON_SECRET)
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should not fail");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["submitted"], 2);
    assert_eq!(json["failed"], 0);

    let tasks = harness.queue.enqueued().await;
    assert_eq!(tasks.len(), 2);
    assert!(tasks
        .iter()
        .all(|t| t.headers.event_type == docwright_core::DOCS_REFRESH_EVENT));
}
