//! # Docwright Service
//!
//! HTTP surface for the Docwright event pipeline.
//!
//! Endpoints:
//! - `POST {webhooks.endpoint_path}` - platform webhook intake
//! - `POST {queue.target_path}` - queue-invoked task consumption
//! - `POST {cron.endpoint_path}` - scheduler-triggered refresh dispatch
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus exposition
//!
//! The service owns HTTP concerns only (status mapping, header projection,
//! the cron shared-secret check); all pipeline semantics live in
//! `docwright-core`.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::{ConfigError, QueueBackend, RuntimeEnvironment, ServiceConfig};
pub use handlers::build_registry;
pub use metrics::ServiceMetrics;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use docwright_core::{
    ConsumeOutcome, CronDispatcher, DispatchError, TaskConsumer, TaskHeaders, WebhookOutcome,
    WebhookReceiver, WebhookRequest,
};
use prometheus::TextEncoder;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

/// Shared secret the external scheduler presents on the cron endpoint.
pub const CRON_SECRET_HEADER: &str = "x-docwright-cron-secret";

// ============================================================================
// Application State
// ============================================================================

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub receiver: Arc<WebhookReceiver>,
    pub consumer: Arc<TaskConsumer>,
    pub cron: Arc<CronDispatcher>,
    pub metrics: Arc<ServiceMetrics>,
}

/// Service-level errors surfaced to the binary for exit-code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

// ============================================================================
// Router and Server
// ============================================================================

/// Create the HTTP router with all endpoints.
///
/// Mount paths for the webhook, consumer, and cron endpoints come from the
/// configuration so deployments can reshape the URL space without code
/// changes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(&state.config.webhooks.endpoint_path, post(receive_webhook))
        .route(&state.config.queue.target_path, post(process_task))
        .route(&state.config.cron.endpoint_path, post(run_cron))
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

/// Start the HTTP server and run until shutdown.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let shutdown_timeout =
        std::time::Duration::from_secs(state.config.server.shutdown_timeout_seconds);

    let app = create_router(state);

    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let shutdown_signal = async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C signal handler");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => error!(error = %e, "Failed to install SIGTERM signal handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!(
                    timeout_seconds = shutdown_timeout.as_secs(),
                    "Received SIGINT, initiating graceful shutdown"
                );
            },
            _ = terminate => {
                info!(
                    timeout_seconds = shutdown_timeout.as_secs(),
                    "Received SIGTERM, initiating graceful shutdown"
                );
            },
        }
    };

    // In-flight requests complete; new connections are refused immediately.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Intake
// ============================================================================

/// Handle platform webhook deliveries.
///
/// The raw body bytes pass to the receiver untouched; all parsing and
/// verification happens there. This handler only projects headers, maps the
/// outcome to a status code, and counts.
#[instrument(skip(state, headers, body))]
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.metrics.webhooks_received_total.inc();
    let timer = state.metrics.webhook_duration_seconds.start_timer();

    let header_map = lowercase_headers(&headers);
    let outcome = state
        .receiver
        .receive(WebhookRequest::new(header_map, body))
        .await;

    timer.observe_duration();

    let status = StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::OK);
    let body = match outcome {
        WebhookOutcome::Accepted {
            delivery_id,
            routing_key,
            task_id,
        } => {
            state.metrics.webhooks_accepted_total.inc();
            json!({
                "status": "accepted",
                "delivery_id": delivery_id.as_str(),
                "routing_key": routing_key.as_str(),
                "task_id": task_id.as_str(),
            })
        }
        WebhookOutcome::Ignored { routing_key } => {
            state.metrics.webhooks_ignored_total.inc();
            json!({
                "status": "ignored",
                "routing_key": routing_key.as_str(),
            })
        }
        WebhookOutcome::Rejected { message } => {
            state.metrics.webhooks_rejected_total.inc();
            json!({ "error": message })
        }
        WebhookOutcome::Failed { message } => {
            state.metrics.webhooks_failed_total.inc();
            json!({ "error": message })
        }
    };

    (status, Json(body))
}

// ============================================================================
// Task Consumption
// ============================================================================

/// Handle a task delivered by the queue infrastructure.
///
/// Non-2xx responses instruct the queue to redeliver; 400s mark the task as
/// malformed so the queue can dead-letter it instead of retrying forever.
#[instrument(skip(state, headers, body))]
async fn process_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header_map = lowercase_headers(&headers);

    let task_headers = match TaskHeaders::from_http_headers(&header_map) {
        Ok(task_headers) => task_headers,
        Err(e) => {
            state.metrics.task_failures_total.inc();
            warn!(error = %e, "Task delivery carried invalid headers");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            state.metrics.task_failures_total.inc();
            warn!(
                delivery_id = %task_headers.delivery_id,
                error = %e,
                "Task payload is not valid JSON"
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("payload is not valid JSON: {}", e) })),
            );
        }
    };

    match state.consumer.process(task_headers, payload).await {
        Ok(ConsumeOutcome::Handled { routing_key }) => {
            state.metrics.tasks_processed_total.inc();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "handled",
                    "routing_key": routing_key.as_str(),
                })),
            )
        }
        Ok(ConsumeOutcome::Skipped { routing_key }) => {
            state.metrics.tasks_processed_total.inc();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "skipped",
                    "routing_key": routing_key.as_str(),
                })),
            )
        }
        Err(e) => {
            state.metrics.task_failures_total.inc();
            error!(error = %e, "Task processing failed");
            (
                dispatch_error_status(&e),
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Map a dispatch failure to the status the queue should see.
///
/// Malformed tasks can never succeed on retry, so they get 400; transient
/// failures (auth, handler) get 500 so the queue redelivers.
fn dispatch_error_status(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::Headers(_) | DispatchError::MissingInstallation { .. } => {
            StatusCode::BAD_REQUEST
        }
        DispatchError::Auth(_) | DispatchError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Cron Trigger
// ============================================================================

/// Handle a scheduler tick.
///
/// Authenticated by a shared secret compared in constant time; there is no
/// webhook sender to sign this request.
#[instrument(skip(state, headers))]
async fn run_cron(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let presented = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let expected = state.config.cron.shared_secret.as_bytes();
    if presented.as_bytes().ct_eq(expected).unwrap_u8() != 1 {
        warn!("Cron trigger rejected: shared secret mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid cron secret" })),
        );
    }

    state.metrics.cron_runs_total.inc();

    match state.cron.dispatch().await {
        Ok(summary) => {
            state
                .metrics
                .cron_tasks_enqueued_total
                .inc_by(summary.submitted as u64);
            info!(
                submitted = summary.submitted,
                failed = summary.failed,
                "Cron dispatch complete"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "status": "dispatched",
                    "submitted": summary.submitted,
                    "failed": summary.failed,
                })),
            )
        }
        Err(e) => {
            error!(error = %e, "Cron dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

// ============================================================================
// Observability Endpoints
// ============================================================================

/// Liveness probe. Always 200 while the process serves requests.
async fn handle_health_check(State(_state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus exposition endpoint.
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&state.metrics.registry().gather())
        .map_err(|e| {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

// ============================================================================
// Helpers
// ============================================================================

/// Project HTTP headers into the lowercase-keyed map the core types consume.
///
/// Values that are not valid UTF-8 are dropped; none of the headers this
/// service reads may legitimately carry binary content.
fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
