//! Periodic backend housekeeping.
//!
//! Every minute the housekeeper walks all backend host groups, hosts and
//! services and deletes the ones we own whose DSR no longer exists. It is
//! the safety net for missed delete events and out-of-band edits.
//!
//! Deletion requires positive evidence: foreign objects are skipped, owned
//! objects without an owner variable are kept (they may predate a schema
//! change) and any DSR lookup error keeps the object for the next pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::controller::Controller;
use crate::reconciler::projector::{cluster_var, owner_var};

pub(crate) const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Owner values are `<namespace>/<name>` with both parts non-empty.
fn split_owner(owner: &str) -> Option<(&str, &str)> {
    match owner.split_once('/') {
        Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
            Some((ns, name))
        }
        _ => None,
    }
}

impl Controller {
    pub(crate) async fn housekeeping_loop(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("stopping housekeeping");
                    return;
                }
                _ = interval.tick() => {
                    self.host_group_housekeeping().await;
                    self.host_housekeeping().await;
                    self.check_housekeeping().await;
                }
            }
        }
    }

    pub(crate) async fn host_group_housekeeping(&self) {
        let hostgroups = match self.icinga.list_host_groups().await {
            Ok(hostgroups) => hostgroups,
            Err(e) => {
                error!("housekeeping: error listing hostgroups: {e}");
                return;
            }
        };

        for hg in hostgroups {
            if cluster_var(&hg.vars) != self.tag {
                continue;
            }

            let Some(owner) = owner_var(&hg.vars).filter(|o| !o.is_empty()) else {
                warn!("housekeeping: hostgroup '{}' has no owner", hg.name);
                continue;
            };

            let Some((ns, name)) = split_owner(owner) else {
                error!(
                    "housekeeping: error parsing owner of hostgroup '{}' ('{owner}')",
                    hg.name
                );
                continue;
            };

            match self.dsr.get_host_group(ns, name).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!("housekeeping: deleting obsolete icinga hostgroup '{}'", hg.name);
                    if let Err(e) = self.icinga.delete_host_group(&hg.name).await {
                        error!(
                            "housekeeping: error deleting icinga hostgroup '{}': {e}",
                            hg.name
                        );
                    }
                }
                Err(e) => {
                    error!(
                        "housekeeping: error getting hostgroup resource for '{ns}/{name}': {e}"
                    );
                }
            }
        }
    }

    pub(crate) async fn host_housekeeping(&self) {
        let hosts = match self.icinga.list_hosts().await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!("housekeeping: error listing hosts: {e}");
                return;
            }
        };

        for host in hosts {
            if cluster_var(&host.vars) != self.tag {
                continue;
            }

            let Some(owner) = owner_var(&host.vars).filter(|o| !o.is_empty()) else {
                warn!("housekeeping: host '{}' has no owner", host.name);
                continue;
            };

            let Some((ns, name)) = split_owner(owner) else {
                error!(
                    "housekeeping: error parsing owner of host '{}' ('{owner}')",
                    host.name
                );
                continue;
            };

            match self.dsr.get_host(ns, name).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!("housekeeping: deleting obsolete icinga host '{}'", host.name);
                    if let Err(e) = self.icinga.delete_host(&host.name).await {
                        error!("housekeeping: error deleting icinga host '{}': {e}", host.name);
                    }
                }
                Err(e) => {
                    error!("housekeeping: error getting host resource for '{ns}/{name}': {e}");
                }
            }
        }
    }

    pub(crate) async fn check_housekeeping(&self) {
        let services = match self.icinga.list_services().await {
            Ok(services) => services,
            Err(e) => {
                error!("housekeeping: error listing services: {e}");
                return;
            }
        };

        for service in services {
            if cluster_var(&service.vars) != self.tag {
                continue;
            }

            let Some(owner) = owner_var(&service.vars).filter(|o| !o.is_empty()) else {
                warn!("housekeeping: service '{}' has no owner", service.full_name());
                continue;
            };

            let Some((ns, name)) = split_owner(owner) else {
                error!(
                    "housekeeping: error parsing owner of service '{}' ('{owner}')",
                    service.full_name()
                );
                continue;
            };

            match self.dsr.get_check(ns, name).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let full_name = service.full_name();
                    info!("housekeeping: deleting obsolete icinga service '{full_name}'");
                    if let Err(e) = self.icinga.delete_service(&full_name).await {
                        error!(
                            "housekeeping: error deleting icinga service '{full_name}': {e}"
                        );
                    }
                }
                Err(e) => {
                    error!("housekeeping: error getting check resource for '{ns}/{name}': {e}");
                }
            }
        }
    }
}
