//! Bootstrap loop for cluster-scope records.
//!
//! Every minute, re-ensure the DSRs that do not hang off any watched
//! object: the cluster container (Host mapping only), the nodes and
//! infrastructure collections, and one record per ComponentStatus.
//! ComponentStatuses cannot be watched, so they are re-listed each pass.
//! Errors are logged and the loop continues.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::ComponentStatus;
use kube::api::ListParams;
use kube::{Api, ResourceExt};
use tokio::sync::watch;
use tracing::{error, info};

use crate::controller::Controller;

pub(crate) const DEFAULTS_INTERVAL: Duration = Duration::from_secs(60);

impl Controller {
    pub(crate) async fn defaults_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(DEFAULTS_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("stopping defaults loop");
                    return;
                }
                _ = interval.tick() => {
                    self.ensure_default_records().await;
                    self.refresh_component_statuses().await;
                }
            }
        }
    }

    pub(crate) async fn ensure_default_records(&self) {
        if let Err(e) = self.mapping.monitor_cluster(self).await {
            error!("error setting up monitoring for the cluster: {e}");
        }
        if let Err(e) = self.mapping.monitor_nodes_group(self).await {
            error!("error ensuring the nodes group: {e}");
        }
        if let Err(e) = self.mapping.monitor_infrastructure_group(self).await {
            error!("error ensuring the infrastructure group: {e}");
        }
    }

    /// ComponentStatuses have to be listed; the API does not support
    /// watching them.
    pub(crate) async fn refresh_component_statuses(&self) {
        let Some(client) = self.client.clone() else {
            return;
        };

        let api: Api<ComponentStatus> = Api::all(client);
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                for cs in list {
                    if let Err(e) = self.mapping.monitor_component_status(self, &cs).await {
                        error!(
                            "error monitoring componentstatus '{}': {e}",
                            cs.name_any()
                        );
                    }
                }
            }
            Err(e) => {
                error!("error listing componentstatuses: {e}");
            }
        }
    }
}
