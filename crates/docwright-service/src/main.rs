//! # Docwright Service
//!
//! Binary entry point for the Docwright HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Wires the webhook receiver, task consumer, and cron dispatcher
//! - Starts the HTTP server from the library crate

use docwright_core::{
    CronDispatcher, HttpTaskQueue, HttpWorkItemStore, InMemoryTaskQueue, SignatureVerifier,
    StaticSecretProvider, TaskConsumer, TaskProducer, TaskQueue, WebhookReceiver,
};
use docwright_github::{
    AppId, AuthError, CachedClientFactory, HttpTokenExchanger, InstallationClient,
    InstallationClientProvider, InstallationId, Rs256JwtSigner,
};
use docwright_service::{
    build_registry, start_server, AppState, QueueBackend, ServiceConfig, ServiceError,
    ServiceMetrics,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "docwright_service=info,docwright_core=info,docwright_github=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Docwright Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/docwright/service.yaml     - system-wide defaults
    //  2. ./config/service.yaml           - deployment-local override
    //  3. Path given by DW_CONFIG_FILE    - operator-specified file
    //  4. Environment variables prefixed DW__ (double-underscore separator)
    //     e.g. DW__SERVER__PORT=9090 sets server.port = 9090
    //
    // Every field carries a serde default, so absent files still produce a
    // valid development configuration. A malformed file or an uncoercible
    // environment variable is a hard error: it indicates deliberate but
    // broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/docwright/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("DW_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("DW").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Wire the pipeline
    //
    // Construction order follows the data flow: queue -> producer -> registry
    // -> receiver on the intake side; signer -> exchanger -> client factory
    // -> consumer on the processing side. Everything is built here, once, so
    // no component registers or reconfigures itself after startup.
    // -------------------------------------------------------------------------
    if service_config.webhooks.secret.is_empty() {
        warn!("No webhook secret configured; all signed deliveries will be rejected");
    }

    let verifier = SignatureVerifier::new(Arc::new(StaticSecretProvider::new(
        service_config.webhooks.secret.clone(),
    )));

    let http = reqwest::Client::new();

    let queue: Arc<dyn TaskQueue> = match &service_config.queue.backend {
        QueueBackend::Http { enqueue_url } => {
            info!(enqueue_url = %enqueue_url, "Using HTTP task queue backend");
            Arc::new(HttpTaskQueue::new(http.clone(), enqueue_url.clone()))
        }
        QueueBackend::Memory => {
            warn!("Using in-memory task queue; tasks are recorded but never delivered");
            Arc::new(InMemoryTaskQueue::new())
        }
    };

    let producer = Arc::new(TaskProducer::new(
        queue,
        service_config.queue.target_path.clone(),
        service_config.queue.audience.clone(),
    ));

    let registry = Arc::new(build_registry());

    let receiver = Arc::new(WebhookReceiver::new(
        verifier,
        Arc::clone(&registry),
        Arc::clone(&producer),
        service_config.dev_bypass_enabled(),
    ));

    let clients: Arc<dyn InstallationClientProvider> =
        if service_config.github.private_key_pem.is_empty() {
            // Permitted outside production only; validate() rejects this
            // combination for production environments.
            warn!(
                "No GitHub App private key configured; task processing will fail \
                 until one is supplied"
            );
            Arc::new(UnconfiguredClientProvider)
        } else {
            let signer = match Rs256JwtSigner::from_pem(&service_config.github.private_key_pem) {
                Ok(signer) => signer,
                Err(e) => {
                    error!(error = %e, "GitHub App private key is unusable; aborting");
                    std::process::exit(3);
                }
            };

            let exchanger = Arc::new(HttpTokenExchanger::new(
                http.clone(),
                service_config.github.api_url.clone(),
                AppId::new(service_config.github.app_id),
                Arc::new(signer),
            ));

            Arc::new(
                CachedClientFactory::new(exchanger, service_config.github.api_url.clone())
                    .with_client_ttl(chrono::Duration::minutes(
                        service_config.github.client_ttl_minutes,
                    )),
            )
        };

    let consumer = Arc::new(TaskConsumer::new(Arc::clone(&registry), clients));

    let store = Arc::new(HttpWorkItemStore::new(
        http,
        service_config.store.base_url.clone(),
    ));
    let cron = Arc::new(CronDispatcher::new(
        store,
        producer,
        service_config.cron.feature.clone(),
    ));

    let metrics = match ServiceMetrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!(error = %e, "Failed to initialize metrics; aborting");
            std::process::exit(3);
        }
    };

    let state = AppState {
        config: Arc::new(service_config),
        receiver,
        consumer,
        cron,
        metrics,
    };

    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Client provider used when no GitHub App credentials are configured.
///
/// Webhook intake and cron dispatch keep working; every task that reaches
/// the consumer fails with an auth error until a key is supplied.
struct UnconfiguredClientProvider;

#[async_trait::async_trait]
impl InstallationClientProvider for UnconfiguredClientProvider {
    async fn client_for(
        &self,
        _installation_id: InstallationId,
    ) -> Result<std::sync::Arc<InstallationClient>, AuthError> {
        Err(AuthError::InvalidPrivateKey {
            message: "no GitHub App private key configured".to_string(),
        })
    }
}
