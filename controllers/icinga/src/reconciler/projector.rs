//! DSR → backend projection.
//!
//! Watching the DSR kinds drives these handlers: each one computes the
//! backend object a record calls for, fetches what the backend currently
//! holds, and creates, updates or refuses. The ownership gate is the
//! `kubernetes_cluster` variable: an object whose tag differs from ours is
//! foreign and is never mutated, even on delete.

use std::collections::BTreeMap;

use icinga_client as icinga;
use icinga_client::Vars;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::config::{vars, SYSTEM_NAMESPACE};
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::reconciler::{merge_vars, vars_differ};

/// The cluster tag on a backend object, empty when absent or non-string.
pub(crate) fn cluster_var(object_vars: &Vars) -> &str {
    object_vars
        .get(vars::CLUSTER)
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// The owner `<ns>/<name>` on a backend object, if present.
pub(crate) fn owner_var(object_vars: &Vars) -> Option<&str> {
    object_vars.get(vars::OWNER).and_then(|v| v.as_str())
}

/// Normalized drift check for a host group: name and vars.
pub(crate) fn host_group_differs(observed: &icinga::HostGroup, desired: &icinga::HostGroup) -> bool {
    observed.name != desired.name || vars_differ(&observed.vars, &desired.vars)
}

/// Normalized drift check for a host. An empty desired check command means
/// the record does not care, so it is left out of the comparison.
pub(crate) fn host_differs(observed: &icinga::Host, desired: &icinga::Host) -> bool {
    observed.name != desired.name
        || (!desired.check_command.is_empty() && observed.check_command != desired.check_command)
        || observed.groups != desired.groups
        || vars_differ(&observed.vars, &desired.vars)
        || observed.notes != desired.notes
        || observed.notes_url != desired.notes_url
}

/// Normalized drift check for a service, same check-command rule as hosts.
pub(crate) fn service_differs(observed: &icinga::Service, desired: &icinga::Service) -> bool {
    (!desired.check_command.is_empty() && observed.check_command != desired.check_command)
        || observed.notes != desired.notes
        || observed.notes_url != desired.notes_url
        || vars_differ(&observed.vars, &desired.vars)
}

impl Controller {
    /// `<tag>.<name>`, or the bare tag for the empty-name sentinel.
    pub(crate) fn qualified_name(&self, name: &str) -> String {
        if name == crds::EMPTY_NAME {
            self.tag.clone()
        } else {
            format!("{}.{}", self.tag, name)
        }
    }

    /// Full desired variables for a backend object: defaults, then the
    /// record's own vars, then the ownership header. Later maps win.
    fn desired_vars(&self, spec_vars: &BTreeMap<String, String>, owner: &str) -> Vars {
        let mut header = BTreeMap::new();
        header.insert(vars::CLUSTER.to_string(), self.tag.clone());
        header.insert(vars::OWNER.to_string(), owner.to_string());

        merge_vars(&[&self.default_vars, spec_vars, &header])
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect()
    }

    fn record_key<K: ResourceExt>(&self, record: &K) -> String {
        format!(
            "{}/{}",
            record.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into()),
            record.name_any()
        )
    }

    pub(crate) async fn host_group_created_or_updated(
        &self,
        hostgroup: &crds::HostGroup,
    ) -> Result<(), ControllerError> {
        let owner = self.record_key(hostgroup);
        debug!("processing hostgroup '{owner}'");

        let desired = icinga::HostGroup {
            name: self.qualified_name(&hostgroup.spec.name),
            vars: self.desired_vars(&hostgroup.spec.vars, &owner),
        };

        match self.icinga.get_host_group(&desired.name).await {
            Ok(observed) => {
                if cluster_var(&observed.vars) != self.tag {
                    self.recorder
                        .publish(
                            hostgroup,
                            "HostGroup",
                            &format!("hostgroup '{}' is owned by another cluster", desired.name),
                            true,
                        )
                        .await;
                    return Err(ControllerError::NotManaged {
                        name: desired.name,
                        cluster: cluster_var(&observed.vars).to_string(),
                    });
                }

                if host_group_differs(&observed, &desired) {
                    info!("updating icinga hostgroup '{}'", desired.name);
                    match self.icinga.update_host_group(&desired).await {
                        Ok(()) => {
                            self.recorder
                                .publish(hostgroup, "HostGroup", "hostgroup updated", false)
                                .await;
                        }
                        Err(e) => {
                            self.recorder
                                .publish(hostgroup, "HostGroup", &e.to_string(), true)
                                .await;
                            return Err(e.into());
                        }
                    }
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("creating icinga hostgroup '{}'", desired.name);
                match self.icinga.create_host_group(&desired).await {
                    Ok(()) => {
                        self.recorder
                            .publish(hostgroup, "HostGroup", "hostgroup created", false)
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        self.recorder
                            .publish(hostgroup, "HostGroup", &e.to_string(), true)
                            .await;
                        Err(e.into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn host_group_deleted(
        &self,
        hostgroup: &crds::HostGroup,
    ) -> Result<(), ControllerError> {
        debug!("processing deleted hostgroup '{}'", self.record_key(hostgroup));
        let name = self.qualified_name(&hostgroup.spec.name);

        let observed = match self.icinga.get_host_group(&name).await {
            Ok(observed) => observed,
            Err(_) => return Ok(()),
        };

        if cluster_var(&observed.vars) != self.tag {
            debug!(
                "cannot delete hostgroup '{name}': it is not managed by us ('{}')",
                cluster_var(&observed.vars)
            );
            return Ok(());
        }

        info!("deleting icinga hostgroup '{name}'");
        self.icinga.delete_host_group(&name).await?;
        Ok(())
    }

    pub(crate) async fn host_created_or_updated(
        &self,
        host: &crds::Host,
    ) -> Result<(), ControllerError> {
        let owner = self.record_key(host);
        debug!("processing host '{owner}'");

        let desired = icinga::Host {
            name: self.qualified_name(&host.spec.name),
            groups: host
                .spec
                .hostgroups
                .iter()
                .map(|g| self.qualified_name(g))
                .collect(),
            check_command: host.spec.check_command.clone(),
            notes: host.spec.notes.clone(),
            notes_url: host.spec.notes_url.clone(),
            vars: self.desired_vars(&host.spec.vars, &owner),
        };

        match self.icinga.get_host(&desired.name).await {
            Ok(observed) => {
                if cluster_var(&observed.vars) != self.tag {
                    self.recorder
                        .publish(
                            host,
                            "Host",
                            &format!("host '{}' is owned by another cluster", desired.name),
                            true,
                        )
                        .await;
                    return Err(ControllerError::NotManaged {
                        name: desired.name,
                        cluster: cluster_var(&observed.vars).to_string(),
                    });
                }

                if host_differs(&observed, &desired) {
                    info!("updating icinga host '{}'", desired.name);
                    match self.icinga.update_host(&desired).await {
                        Ok(()) => {
                            self.recorder.publish(host, "Host", "host updated", false).await;
                        }
                        Err(e) => {
                            self.recorder.publish(host, "Host", &e.to_string(), true).await;
                            return Err(e.into());
                        }
                    }
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("creating icinga host '{}'", desired.name);
                match self.icinga.create_host(&desired).await {
                    Ok(()) => {
                        self.recorder.publish(host, "Host", "host created", false).await;
                        Ok(())
                    }
                    Err(e) => {
                        self.recorder.publish(host, "Host", &e.to_string(), true).await;
                        Err(e.into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn host_deleted(&self, host: &crds::Host) -> Result<(), ControllerError> {
        debug!("processing deleted host '{}'", self.record_key(host));
        let name = self.qualified_name(&host.spec.name);

        let observed = match self.icinga.get_host(&name).await {
            Ok(observed) => observed,
            Err(_) => return Ok(()),
        };

        if cluster_var(&observed.vars) != self.tag {
            debug!(
                "cannot delete host '{name}': it is not managed by us ('{}')",
                cluster_var(&observed.vars)
            );
            return Ok(());
        }

        info!("deleting icinga host '{name}'");
        self.icinga.delete_host(&name).await?;
        Ok(())
    }

    pub(crate) async fn check_created_or_updated(
        &self,
        check: &crds::Check,
    ) -> Result<(), ControllerError> {
        let owner = self.record_key(check);
        debug!("processing check '{owner}'");

        let desired = icinga::Service {
            name: check.spec.name.clone(),
            host_name: self.qualified_name(&check.spec.host),
            check_command: check.spec.check_command.clone(),
            notes: check.spec.notes.clone(),
            notes_url: check.spec.notes_url.clone(),
            vars: self.desired_vars(&check.spec.vars, &owner),
        };
        let full_name = desired.full_name();

        match self.icinga.get_service(&full_name).await {
            Ok(observed) => {
                if cluster_var(&observed.vars) != self.tag {
                    self.recorder
                        .publish(
                            check,
                            "Check",
                            &format!("service '{full_name}' is owned by another cluster"),
                            true,
                        )
                        .await;
                    return Err(ControllerError::NotManaged {
                        name: full_name,
                        cluster: cluster_var(&observed.vars).to_string(),
                    });
                }

                if service_differs(&observed, &desired) {
                    info!("updating icinga service '{full_name}'");
                    match self.icinga.update_service(&desired).await {
                        Ok(()) => {
                            self.recorder
                                .publish(check, "Check", "service updated", false)
                                .await;
                        }
                        Err(e) => {
                            self.recorder.publish(check, "Check", &e.to_string(), true).await;
                            return Err(e.into());
                        }
                    }
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("creating icinga service '{full_name}'");
                match self.icinga.create_service(&desired).await {
                    Ok(()) => {
                        self.recorder
                            .publish(check, "Check", "service created", false)
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        self.recorder.publish(check, "Check", &e.to_string(), true).await;
                        Err(e.into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn check_deleted(&self, check: &crds::Check) -> Result<(), ControllerError> {
        debug!("processing deleted check '{}'", self.record_key(check));
        let full_name = format!(
            "{}!{}",
            self.qualified_name(&check.spec.host),
            check.spec.name
        );

        let observed = match self.icinga.get_service(&full_name).await {
            Ok(observed) => observed,
            Err(_) => return Ok(()),
        };

        if cluster_var(&observed.vars) != self.tag {
            warn!(
                "cannot delete service '{full_name}': it is not managed by us ('{}')",
                cluster_var(&observed.vars)
            );
            return Ok(());
        }

        info!("deleting icinga service '{full_name}'");
        self.icinga.delete_service(&full_name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn host(name: &str) -> icinga::Host {
        icinga::Host {
            name: name.to_string(),
            groups: vec!["testing.default".to_string()],
            check_command: "check_kubernetes".to_string(),
            notes: "notes".to_string(),
            notes_url: "http://site.com/docs".to_string(),
            vars: string_vars(&[(vars::CLUSTER, "testing")]),
        }
    }

    #[test]
    fn identical_hostgroups_do_not_differ() {
        let a = icinga::HostGroup {
            name: "testing.default".to_string(),
            vars: string_vars(&[(vars::CLUSTER, "testing")]),
        };
        assert!(!host_group_differs(&a, &a.clone()));

        let mut drifted = a.clone();
        drifted
            .vars
            .insert("extra".to_string(), serde_json::Value::String("x".into()));
        assert!(host_group_differs(&drifted, &a));
    }

    #[test]
    fn host_field_drift_is_detected() {
        let observed = host("testing.default.po-standalone");

        let mut desired = observed.clone();
        desired.notes = "new notes".to_string();
        assert!(host_differs(&observed, &desired));

        let mut desired = observed.clone();
        desired.groups = vec!["testing.other".to_string()];
        assert!(host_differs(&observed, &desired));

        let mut desired = observed.clone();
        desired.notes_url = "http://site.com/docsv2".to_string();
        assert!(host_differs(&observed, &desired));

        assert!(!host_differs(&observed, &observed.clone()));
    }

    #[test]
    fn empty_desired_check_command_is_ignored() {
        let observed = host("testing.default.po-standalone");

        let mut desired = observed.clone();
        desired.check_command = String::new();
        assert!(!host_differs(&observed, &desired));

        let mut desired = observed.clone();
        desired.check_command = "check_http".to_string();
        assert!(host_differs(&observed, &desired));
    }

    #[test]
    fn service_drift_is_detected() {
        let observed = icinga::Service {
            name: "http-check".to_string(),
            host_name: "testing.myhost".to_string(),
            check_command: "check_http".to_string(),
            notes: String::new(),
            notes_url: String::new(),
            vars: string_vars(&[(vars::CLUSTER, "testing")]),
        };

        assert!(!service_differs(&observed, &observed.clone()));

        let mut desired = observed.clone();
        desired.check_command = String::new();
        assert!(!service_differs(&observed, &desired));

        let mut desired = observed.clone();
        desired.notes = "probe for the docs site".to_string();
        assert!(service_differs(&observed, &desired));

        let mut desired = observed.clone();
        desired.vars = string_vars(&[(vars::CLUSTER, "testing"), ("http_uri", "/health")]);
        assert!(service_differs(&observed, &desired));
    }
}
