//! Webhook intake: envelope extraction, verification, routing.
//!
//! A request moves through a small state machine:
//!
//! ```text
//! RECEIVED -> HEADERS_EXTRACTED -> (VERIFIED | REJECTED)
//!          -> (ROUTED | IGNORED) -> ACKNOWLEDGED
//! ```
//!
//! The raw body bytes are kept untouched until signature verification has
//! completed; only then is the JSON parsed to pull out the action and
//! installation id. Events whose routing key has no registered handler are
//! acknowledged with 200 and dropped before any task is created, so the
//! queue never carries work nobody will do.

pub mod signature;

pub use signature::{SecretProvider, SignatureVerifier, StaticSecretProvider};

use crate::error::ValidationError;
use crate::registry::HandlerRegistry;
use crate::tasks::{TaskHeaders, TaskId, TaskProducer};
use crate::{DeliveryId, InstallationId};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `X-GitHub-Delivery`: opaque unique id per delivery.
pub const DELIVERY_ID_HEADER: &str = "x-github-delivery";

/// `X-GitHub-Event`: event type, e.g. `push` or `pull_request`.
pub const EVENT_TYPE_HEADER: &str = "x-github-event";

/// `X-Hub-Signature-256`: HMAC-SHA256 digest of the raw body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Dev-only verification bypass. Honored only when the receiver was built
/// with the bypass enabled, which itself requires a non-production
/// environment.
pub const DEV_BYPASS_HEADER: &str = "x-docwright-dev-bypass";

/// Value the bypass header must carry to take effect.
pub const DEV_BYPASS_VALUE: &str = "allow";

// ============================================================================
// Envelope Types
// ============================================================================

/// Routing metadata projected out of the transport headers.
///
/// Pure projection; no validation beyond presence of the required fields.
/// The action is deliberately absent here: GitHub carries it in the body,
/// which must stay unparsed until the signature has been verified.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub delivery_id: DeliveryId,
    pub event_type: String,
    pub signature: Option<String>,
    pub dev_bypass_requested: bool,
}

impl WebhookHeaders {
    /// Extract routing metadata from a lowercase-keyed header map.
    ///
    /// Missing delivery id or event type is malformed input. A missing
    /// signature is not; the receiver decides how to treat it.
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let delivery_id = headers
            .get(DELIVERY_ID_HEADER)
            .ok_or_else(|| ValidationError::Required {
                field: "X-GitHub-Delivery".to_string(),
            })?;

        let event_type = headers
            .get(EVENT_TYPE_HEADER)
            .ok_or_else(|| ValidationError::Required {
                field: "X-GitHub-Event".to_string(),
            })?;

        if event_type.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "X-GitHub-Event".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let signature = headers.get(SIGNATURE_HEADER).cloned();

        let dev_bypass_requested = headers
            .get(DEV_BYPASS_HEADER)
            .map(|v| v == DEV_BYPASS_VALUE)
            .unwrap_or(false);

        Ok(Self {
            delivery_id: DeliveryId::new(delivery_id.clone()),
            event_type: event_type.clone(),
            signature,
            dev_bypass_requested,
        })
    }
}

/// Raw inbound webhook request: headers plus the exact body bytes received.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    pub fn new(headers: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            headers,
            body,
            received_at: Utc::now(),
        }
    }
}

/// The string used to look up which handler processes an event.
///
/// Derived as `eventType` alone, or `eventType.action` when an action
/// exists. The derivation is the single source of truth: the consumer
/// re-derives the key from task headers instead of trusting a pass-through
/// string, so enqueue-time and dequeue-time keys cannot diverge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(event_type: &str, action: Option<&str>) -> Self {
        match action {
            Some(action) => Self(format!("{}.{}", event_type, action)),
            None => Self(event_type.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A verified, parsed event as handed to handlers.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub delivery_id: DeliveryId,
    pub event_type: String,
    pub action: Option<String>,
    pub installation_id: Option<InstallationId>,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(&self.event_type, self.action.as_deref())
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Terminal state of webhook intake, with its HTTP mapping.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// 200 - verified, routed, and enqueued.
    Accepted {
        delivery_id: DeliveryId,
        routing_key: RoutingKey,
        task_id: TaskId,
    },

    /// 200 - verified but no handler registered; acknowledged so the sender
    /// does not retry, with no task created.
    Ignored { routing_key: RoutingKey },

    /// 400 - missing required headers, unparseable body, or a signature that
    /// failed verification. Not retried by the sender.
    Rejected { message: String },

    /// 500 - the enqueue call itself failed. The sender will redeliver.
    Failed { message: String },
}

impl WebhookOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted { .. } | Self::Ignored { .. } => 200,
            Self::Rejected { .. } => 400,
            Self::Failed { .. } => 500,
        }
    }
}

/// Orchestrates header extraction, verification, routing, and hand-off.
///
/// Holds no per-request state; a single receiver is shared across all
/// inbound requests.
pub struct WebhookReceiver {
    verifier: SignatureVerifier,
    registry: Arc<HandlerRegistry>,
    producer: Arc<TaskProducer>,
    /// Only ever true outside production; see [`WebhookReceiver::new`].
    allow_dev_bypass: bool,
}

impl WebhookReceiver {
    /// Create a receiver.
    ///
    /// `allow_dev_bypass` must be computed from the runtime environment by
    /// the caller and must be `false` in production; when true, a request
    /// carrying the bypass header is accepted without a valid signature and
    /// a WARN is logged.
    pub fn new(
        verifier: SignatureVerifier,
        registry: Arc<HandlerRegistry>,
        producer: Arc<TaskProducer>,
        allow_dev_bypass: bool,
    ) -> Self {
        if allow_dev_bypass {
            warn!("Webhook signature dev bypass is enabled; never run this configuration in production");
        }
        Self {
            verifier,
            registry,
            producer,
            allow_dev_bypass,
        }
    }

    /// Process one inbound webhook request through to an outcome.
    pub async fn receive(&self, request: WebhookRequest) -> WebhookOutcome {
        // RECEIVED -> HEADERS_EXTRACTED
        let headers = match WebhookHeaders::from_http_headers(&request.headers) {
            Ok(headers) => headers,
            Err(e) => {
                return WebhookOutcome::Rejected {
                    message: e.to_string(),
                };
            }
        };

        // HEADERS_EXTRACTED -> VERIFIED / REJECTED
        if let Some(outcome) = self.verify(&headers, &request.body).await {
            return outcome;
        }

        // Body is parsed only now, after verification over the raw bytes.
        let payload: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(payload) => payload,
            Err(e) => {
                return WebhookOutcome::Rejected {
                    message: format!("payload is not valid JSON: {}", e),
                };
            }
        };

        let action = payload
            .get("action")
            .and_then(|a| a.as_str())
            .map(str::to_string);
        let installation_id = payload
            .get("installation")
            .and_then(|i| i.get("id"))
            .and_then(|id| id.as_u64())
            .map(InstallationId::new);

        // VERIFIED -> ROUTED / IGNORED
        let routing_key = RoutingKey::new(&headers.event_type, action.as_deref());
        if self.registry.lookup(&routing_key).is_none() {
            warn!(
                delivery_id = %headers.delivery_id,
                routing_key = %routing_key,
                "No handler registered for event; acknowledging without enqueue"
            );
            return WebhookOutcome::Ignored { routing_key };
        }

        // ROUTED -> ACKNOWLEDGED
        let task_headers = TaskHeaders {
            delivery_id: headers.delivery_id.clone(),
            event_type: headers.event_type.clone(),
            action,
            installation_id,
        };

        match self.producer.enqueue_event(task_headers, payload).await {
            Ok(task_id) => {
                info!(
                    delivery_id = %headers.delivery_id,
                    routing_key = %routing_key,
                    task_id = %task_id,
                    "Webhook routed to task queue"
                );
                WebhookOutcome::Accepted {
                    delivery_id: headers.delivery_id,
                    routing_key,
                    task_id,
                }
            }
            Err(e) => {
                error!(
                    delivery_id = %headers.delivery_id,
                    routing_key = %routing_key,
                    error = %e,
                    "Failed to enqueue webhook task"
                );
                WebhookOutcome::Failed {
                    message: format!("enqueue failed: {}", e),
                }
            }
        }
    }

    /// Run signature verification; `None` means "proceed".
    async fn verify(&self, headers: &WebhookHeaders, body: &[u8]) -> Option<WebhookOutcome> {
        let bypass = self.allow_dev_bypass && headers.dev_bypass_requested;

        let signature = match headers.signature.as_deref() {
            Some(signature) => signature,
            None => {
                if bypass {
                    warn!(
                        delivery_id = %headers.delivery_id,
                        "DEV BYPASS: accepting webhook without signature"
                    );
                    return None;
                }
                return Some(WebhookOutcome::Rejected {
                    message: "Missing X-Hub-Signature-256 header".to_string(),
                });
            }
        };

        match self.verifier.verify(body, signature).await {
            Ok(true) => None,
            Ok(false) => {
                if bypass {
                    warn!(
                        delivery_id = %headers.delivery_id,
                        "DEV BYPASS: accepting webhook with invalid signature"
                    );
                    return None;
                }
                warn!(
                    delivery_id = %headers.delivery_id,
                    event_type = %headers.event_type,
                    "Webhook signature verification failed"
                );
                Some(WebhookOutcome::Rejected {
                    message: "signature verification failed".to_string(),
                })
            }
            Err(e) => {
                error!(
                    delivery_id = %headers.delivery_id,
                    error = %e,
                    "Signature verification could not be performed"
                );
                Some(WebhookOutcome::Failed {
                    message: format!("verification error: {}", e),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
