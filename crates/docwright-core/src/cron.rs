//! Cron dispatch: periodic re-enumeration of documentation work.
//!
//! The dispatcher is triggered externally on a schedule (it does not
//! self-schedule). Each tick queries the backing store for repositories with
//! the documentation feature enabled and enqueues one refresh task per
//! repository through the same task producer the webhook path uses. The
//! cron path has no webhook "sender", so it is authenticated by a shared
//! secret at the HTTP layer rather than by platform signature; that check
//! lives in the service crate.

use crate::error::CronError;
use crate::store::WorkItemStore;
use crate::tasks::{TaskHeaders, TaskProducer};
use crate::DeliveryId;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Event type under which cron-constructed tasks are routed.
///
/// Registered in the handler registry like any webhook event, so the task
/// consumer needs no cron-specific code path.
pub const DOCS_REFRESH_EVENT: &str = "docs_refresh";

/// Result of one cron tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronRunSummary {
    /// Tasks accepted by the queue.
    pub submitted: usize,

    /// Enqueue attempts that failed. Failures are independent; one bad
    /// submit does not stop the remaining repositories.
    pub failed: usize,
}

/// Enumerates eligible repositories and enqueues one task per repository.
pub struct CronDispatcher {
    store: Arc<dyn WorkItemStore>,
    producer: Arc<TaskProducer>,
    feature: String,
}

impl CronDispatcher {
    /// # Arguments
    ///
    /// * `feature` - Feature-flag name selecting eligible repositories,
    ///   e.g. `"documentation"`.
    pub fn new(store: Arc<dyn WorkItemStore>, producer: Arc<TaskProducer>, feature: String) -> Self {
        Self {
            store,
            producer,
            feature,
        }
    }

    /// Run one tick: query, then fire one enqueue call per work item.
    ///
    /// Returns once every enqueue call has been submitted. Does not wait for
    /// any downstream processing.
    ///
    /// # Errors
    ///
    /// Returns [`CronError::Store`] when the eligibility query fails, and
    /// [`CronError::AllEnqueuesFailed`] when items were found but not a
    /// single enqueue succeeded. Partial failure is reported in the summary
    /// rather than as an error.
    pub async fn dispatch(&self) -> Result<CronRunSummary, CronError> {
        let items = self.store.repositories_with_feature(&self.feature).await?;

        info!(
            feature = %self.feature,
            eligible = items.len(),
            "Cron tick: enqueueing documentation refresh tasks"
        );

        let mut summary = CronRunSummary {
            submitted: 0,
            failed: 0,
        };

        for item in &items {
            let headers = TaskHeaders {
                delivery_id: DeliveryId::generate(),
                event_type: DOCS_REFRESH_EVENT.to_string(),
                action: None,
                installation_id: Some(item.installation_id),
            };

            let payload = json!({
                "team_id": item.team_id,
                "repository": item.repository,
            });

            match self.producer.enqueue_event(headers, payload).await {
                Ok(task_id) => {
                    summary.submitted += 1;
                    info!(
                        repository = %item.repository,
                        task_id = %task_id,
                        "Refresh task enqueued"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        repository = %item.repository,
                        error = %e,
                        "Failed to enqueue refresh task"
                    );
                }
            }
        }

        if summary.submitted == 0 && summary.failed > 0 {
            return Err(CronError::AllEnqueuesFailed {
                attempted: summary.failed,
            });
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
