//! Error taxonomy for the event pipeline.
//!
//! Mapping to transport behavior:
//!
//! | Error | HTTP status | Retried by |
//! |-------|-------------|------------|
//! | [`ValidationError`] (malformed input) | 400 | nobody |
//! | Signature mismatch or malformed header (not an error) | 400 | nobody |
//! | Bad cron secret | 401 | nobody |
//! | No registered handler | 200 | nobody (not an error) |
//! | [`SignatureError`] / [`EnqueueError`] | 5xx | the webhook sender |
//! | [`DispatchError`] (handler/auth failure) | non-2xx | the task queue |

use docwright_github::AuthError;
use thiserror::Error;

/// Malformed input: a required header or field is missing or unusable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },
}

/// Signature verification could not be performed.
///
/// A signature that does not match, including a malformed signature header,
/// is *not* an error; `verify` returns `Ok(false)` for that. These variants
/// cover failures on the verifier's side of the comparison.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Secret cannot be used as HMAC key: {message}")]
    HmacKey { message: String },

    #[error("Webhook secret unavailable: {message}")]
    SecretUnavailable { message: String },
}

/// The task producer could not submit a task to the queue.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Queue rejected task with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Task could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Queue request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// The backing store could not be queried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    #[error("Store response could not be decoded: {message}")]
    Decode { message: String },

    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A handler failed while processing an event.
///
/// Propagates out of the task consumer so the queue infrastructure retries
/// the delivery; the consumer itself performs no retry or backoff.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Handler failed: {message}")]
    Failed { message: String },

    #[error("GitHub API call failed: {0}")]
    GitHub(#[from] AuthError),
}

/// Task consumption failed before or during handler invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Task headers are invalid: {0}")]
    Headers(#[from] ValidationError),

    #[error("Event for '{routing_key}' carries no installation id")]
    MissingInstallation { routing_key: String },

    #[error("Could not resolve installation client: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// A cron tick failed to produce any work.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("Backing store query failed: {0}")]
    Store(#[from] StoreError),

    #[error("All {attempted} enqueue attempts failed")]
    AllEnqueuesFailed { attempted: usize },
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Debug, Error)]
pub enum DocwrightError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Enqueue error: {0}")]
    Enqueue(#[from] EnqueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Cron error: {0}")]
    Cron(#[from] CronError),
}
