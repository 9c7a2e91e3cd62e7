//! Prometheus metrics for the service.
//!
//! Metrics live in a per-instance registry rather than the process-global
//! default so tests can build as many instances as they like without
//! duplicate-registration errors.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Service metrics for observability.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // Webhook intake
    pub webhooks_received_total: IntCounter,
    pub webhooks_accepted_total: IntCounter,
    pub webhooks_ignored_total: IntCounter,
    pub webhooks_rejected_total: IntCounter,
    pub webhooks_failed_total: IntCounter,
    pub webhook_duration_seconds: Histogram,

    // Task consumption
    pub tasks_processed_total: IntCounter,
    pub task_failures_total: IntCounter,

    // Cron dispatch
    pub cron_runs_total: IntCounter,
    pub cron_tasks_enqueued_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let webhooks_received_total = IntCounter::with_opts(Opts::new(
            "docwright_webhooks_received_total",
            "Total webhook requests received",
        ))?;
        let webhooks_accepted_total = IntCounter::with_opts(Opts::new(
            "docwright_webhooks_accepted_total",
            "Webhooks verified, routed, and enqueued",
        ))?;
        let webhooks_ignored_total = IntCounter::with_opts(Opts::new(
            "docwright_webhooks_ignored_total",
            "Webhooks acknowledged without a registered handler",
        ))?;
        let webhooks_rejected_total = IntCounter::with_opts(Opts::new(
            "docwright_webhooks_rejected_total",
            "Webhooks rejected as malformed or unverified",
        ))?;
        let webhooks_failed_total = IntCounter::with_opts(Opts::new(
            "docwright_webhooks_failed_total",
            "Webhooks that could not be enqueued and will be redelivered",
        ))?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "docwright_webhook_duration_seconds",
                "Webhook intake processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;

        let tasks_processed_total = IntCounter::with_opts(Opts::new(
            "docwright_tasks_processed_total",
            "Queue tasks consumed successfully",
        ))?;
        let task_failures_total = IntCounter::with_opts(Opts::new(
            "docwright_task_failures_total",
            "Queue tasks that failed and will be retried by the queue",
        ))?;

        let cron_runs_total = IntCounter::with_opts(Opts::new(
            "docwright_cron_runs_total",
            "Cron dispatch ticks executed",
        ))?;
        let cron_tasks_enqueued_total = IntCounter::with_opts(Opts::new(
            "docwright_cron_tasks_enqueued_total",
            "Tasks enqueued by cron dispatch",
        ))?;

        registry.register(Box::new(webhooks_received_total.clone()))?;
        registry.register(Box::new(webhooks_accepted_total.clone()))?;
        registry.register(Box::new(webhooks_ignored_total.clone()))?;
        registry.register(Box::new(webhooks_rejected_total.clone()))?;
        registry.register(Box::new(webhooks_failed_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;
        registry.register(Box::new(tasks_processed_total.clone()))?;
        registry.register(Box::new(task_failures_total.clone()))?;
        registry.register(Box::new(cron_runs_total.clone()))?;
        registry.register(Box::new(cron_tasks_enqueued_total.clone()))?;

        Ok(Self {
            registry,
            webhooks_received_total,
            webhooks_accepted_total,
            webhooks_ignored_total,
            webhooks_rejected_total,
            webhooks_failed_total,
            webhook_duration_seconds,
            tasks_processed_total,
            task_failures_total,
            cron_runs_total,
            cron_tasks_enqueued_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
