//! Icinga Controller
//!
//! Projects the live inventory of a Kubernetes cluster into an Icinga2
//! backend. Watched cluster objects are translated into desired-state
//! records (HostGroup/Host/Check custom resources) by the selected mapping
//! policy, and those records are in turn projected into backend objects
//! under an ownership discipline that leaves foreign objects untouched.

mod backoff;
mod config;
mod controller;
mod defaults;
mod dsr;
mod error;
mod events;
mod housekeeping;
mod mapping;
mod reconciler;
mod watcher;
mod workqueue;

#[cfg(test)]
mod housekeeping_test;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use icinga_client::{IcingaClient, IcingaClientTrait};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_default();
    let (filter, level_ok) = match EnvFilter::try_new(&log_level) {
        Ok(filter) if !log_level.is_empty() => (filter, true),
        _ => (EnvFilter::new("warn"), log_level.is_empty()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if !level_ok {
        warn!("unknown log level '{log_level}', setting to 'warn'");
    }

    let config = Config::from_env()?;
    info!(
        tag = %config.tag,
        mapping = config.mapping.name(),
        "starting icinga controller"
    );

    // KUBECONFIG is honored here; in-cluster config is the fallback.
    let kube_client = kube::Client::try_default().await.map_err(|e| {
        error!("error creating kubernetes client: {e}");
        ControllerError::Kube(e)
    })?;

    let icinga: Arc<dyn IcingaClientTrait> = Arc::new(
        IcingaClient::new(config.icinga.clone()).map_err(|e| {
            error!("error creating icinga client: {e}");
            ControllerError::Icinga(e)
        })?,
    );

    let controller = Arc::new(Controller::new(kube_client, icinga, config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGINT handler: {e}");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    controller.run(shutdown_rx).await
}
