//! # ECR Secret Controller
//!
//! A Kubernetes controller that keeps docker-registry pull secrets for AWS
//! ECR registries valid.
//!
//! ## Overview
//!
//! For every `ECRSecret` resource the controller:
//!
//! 1. **Fetches an ECR authorization token** - using static per-account credentials from the operator config file
//! 2. **Materializes a pull secret** - a `kubernetes.io/dockerconfigjson` secret owned by the `ECRSecret`
//! 3. **Detects drift** - a content identity annotation reveals hand edits, which are reverted
//! 4. **Renews ahead of expiry** - a periodic sweep requests a reconcile once a secret passes its renewal time
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for deployment and configuration.

use anyhow::Result;
use clap::Parser;
use ecr_secret_controller::config::ControllerConfig;
use ecr_secret_controller::runtime::initialization::initialize;
use ecr_secret_controller::runtime::watch_loop::run_watch_loop;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::parse();

    // Initialize the controller runtime
    let init_result = initialize(&config).await?;

    let cancel = CancellationToken::new();
    let scanner_handle = tokio::spawn(init_result.scanner.start(cancel.clone()));

    tokio::spawn({
        let cancel = cancel.clone();
        let server_state = Arc::clone(&init_result.server_state);
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping renewal scanner");
            server_state.set_ready(false);
            cancel.cancel();
        }
    });

    // Run the watch loop
    run_watch_loop(
        init_result.client,
        init_result.reconciler,
        init_result.renewals,
        init_result.server_state,
    )
    .await?;

    cancel.cancel();
    if let Err(e) = scanner_handle.await {
        warn!("Renewal scanner task ended abnormally: {}", e);
    }

    info!("Controller stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
