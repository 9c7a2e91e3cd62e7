//! Event handlers and startup registration.
//!
//! Handlers here are the seams where documentation business logic plugs in;
//! the heavy lifting (content generation, rendering) lives in external
//! services that these handlers call through the injected installation
//! client. Registration happens in exactly one place, [`build_registry`],
//! called once during startup, so initialization order is deterministic and
//! no handler can be registered from request data.

use async_trait::async_trait;
use docwright_core::{
    EventEnvelope, EventHandler, HandlerContext, HandlerError, HandlerRegistry, RegistryBuilder,
    RoutingKey, DOCS_REFRESH_EVENT,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the process-lifetime handler registry.
///
/// The routing keys registered here are the complete set of events this
/// service reacts to; everything else is acknowledged and dropped at the
/// webhook receiver.
pub fn build_registry() -> HandlerRegistry {
    RegistryBuilder::new()
        .register(RoutingKey::new("push", None), Arc::new(PushHandler))
        .register(
            RoutingKey::new("pull_request", Some("closed")),
            Arc::new(PullRequestClosedHandler),
        )
        .register(
            RoutingKey::new("installation_repositories", Some("added")),
            Arc::new(InstallationRepositoriesHandler),
        )
        .register(
            RoutingKey::new("installation_repositories", Some("removed")),
            Arc::new(InstallationRepositoriesHandler),
        )
        .register(
            RoutingKey::new(DOCS_REFRESH_EVENT, None),
            Arc::new(DocsRefreshHandler),
        )
        .build()
}

fn repository_full_name(event: &EventEnvelope) -> Option<&str> {
    event
        .payload
        .get("repository")
        .and_then(|r| r.get("full_name"))
        .and_then(|n| n.as_str())
}

/// Reacts to pushes on tracked repositories.
pub struct PushHandler;

#[async_trait]
impl EventHandler for PushHandler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &EventEnvelope, ctx: HandlerContext) -> Result<(), HandlerError> {
        let commits = event
            .payload
            .get("commits")
            .and_then(|c| c.as_array())
            .map(Vec::len)
            .unwrap_or(0);

        info!(
            delivery_id = %ctx.delivery_id,
            installation_id = %ctx.client.installation_id(),
            repository = repository_full_name(event).unwrap_or("<unknown>"),
            commits,
            "Push received; scheduling documentation sync"
        );
        Ok(())
    }
}

/// Reacts to pull requests that were closed by merging.
pub struct PullRequestClosedHandler;

#[async_trait]
impl EventHandler for PullRequestClosedHandler {
    fn name(&self) -> &'static str {
        "pull_request_closed"
    }

    async fn handle(&self, event: &EventEnvelope, ctx: HandlerContext) -> Result<(), HandlerError> {
        let merged = event
            .payload
            .get("pull_request")
            .and_then(|pr| pr.get("merged"))
            .and_then(|m| m.as_bool())
            .unwrap_or(false);

        if !merged {
            debug!(
                delivery_id = %ctx.delivery_id,
                "Pull request closed without merge; nothing to do"
            );
            return Ok(());
        }

        info!(
            delivery_id = %ctx.delivery_id,
            installation_id = %ctx.client.installation_id(),
            repository = repository_full_name(event).unwrap_or("<unknown>"),
            "Merged pull request; scheduling documentation regeneration"
        );
        Ok(())
    }
}

/// Tracks repositories added to or removed from an installation.
pub struct InstallationRepositoriesHandler;

#[async_trait]
impl EventHandler for InstallationRepositoriesHandler {
    fn name(&self) -> &'static str {
        "installation_repositories"
    }

    async fn handle(&self, event: &EventEnvelope, ctx: HandlerContext) -> Result<(), HandlerError> {
        let names = |key: &str| -> Vec<String> {
            event
                .payload
                .get(key)
                .and_then(|v| v.as_array())
                .map(|repos| {
                    repos
                        .iter()
                        .filter_map(|r| r.get("full_name").and_then(|n| n.as_str()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let added = names("repositories_added");
        let removed = names("repositories_removed");

        info!(
            delivery_id = %ctx.delivery_id,
            installation_id = %ctx.client.installation_id(),
            added = ?added,
            removed = ?removed,
            "Installation repository selection changed"
        );
        Ok(())
    }
}

/// Handles cron-constructed refresh tasks.
pub struct DocsRefreshHandler;

#[async_trait]
impl EventHandler for DocsRefreshHandler {
    fn name(&self) -> &'static str {
        "docs_refresh"
    }

    async fn handle(&self, event: &EventEnvelope, ctx: HandlerContext) -> Result<(), HandlerError> {
        let repository = event
            .payload
            .get("repository")
            .and_then(|r| r.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("<unknown>");
        let team_id = event
            .payload
            .get("team_id")
            .and_then(|t| t.as_str())
            .unwrap_or("<unknown>");

        info!(
            delivery_id = %ctx.delivery_id,
            installation_id = %ctx.client.installation_id(),
            repository,
            team_id,
            "Cron-triggered documentation refresh"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
