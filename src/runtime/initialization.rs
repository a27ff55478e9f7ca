//! # Initialization
//!
//! Controller startup: rustls, tracing, metrics, the probe server, the
//! Kubernetes client, the reconciler and the renewal scanner.

use crate::clock::{Clock, SystemClock};
use crate::config::ControllerConfig;
use crate::constants;
use crate::controller::reconciler::Reconciler;
use crate::controller::renewal::{renewal_channel, RenewalReceiver, RenewalScanner};
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::{ClusterStore, KubeStore};
use crate::crd::ECRSecret;
use crate::observability;
use crate::provider::aws::EcrCredentialSource;
use anyhow::{Context, Result};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop and the renewal scanner need
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub scanner: RenewalScanner,
    pub renewals: RenewalReceiver,
    pub server_state: Arc<ServerState>,
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Returns an error if metrics cannot be registered, the probe server does
/// not come up, or no Kubernetes client can be built.
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecr_secret_controller=info".into()),
        )
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting ECR Secret Controller v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_file = %config.config_file.display(),
        max_age = %config.max_age,
        renewal_interval = ?config.renewal_interval,
        "Controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn({
        let server_state = Arc::clone(&server_state);
        async move {
            if let Err(e) = start_server(server_port, server_state).await {
                error!("HTTP server error: {}", e);
            }
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    log_existing_resources(&Api::all(client.clone())).await;

    let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(client.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::new(EcrCredentialSource),
        Arc::clone(&clock),
        config.config_file.clone(),
        config.max_age,
    ));

    let (sender, renewals) = renewal_channel(config.notification_buffer);
    let scanner = RenewalScanner::new(
        store,
        clock,
        config.max_age,
        config.renewal_interval,
        config.renewal_poll,
        sender,
    );

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        scanner,
        renewals,
        server_state,
    })
}

/// Wait for the HTTP server to bind
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout =
        std::time::Duration::from_secs(constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval =
        std::time::Duration::from_millis(constants::DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log existing `ECRSecret` resources by namespace
///
/// Also surfaces a missing CRD before the watch starts.
async fn log_existing_resources(ecr_secrets: &Api<ECRSecret>) {
    match ecr_secrets.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.namespace().unwrap_or_else(|| "default".to_string()))
                    .or_default()
                    .push(item.name_any());
            }

            info!(
                "Found {} existing ECRSecret resources in {} namespaces",
                list.items.len(),
                by_namespace.len()
            );
            for (namespace, names) in &by_namespace {
                info!("  {}: {}", namespace, names.join(", "));
            }
        }
        Err(e) => {
            warn!(
                "Unable to list ECRSecret resources, is the CRD installed? {}",
                e
            );
        }
    }
}
