//! Mapping policies
//!
//! A mapping decides which DSR kind represents each cluster concept. Two
//! policies share one method set and are selected at startup:
//!
//! - `HostGroup`: namespaces become backend groups, workloads become hosts
//!   inside their namespace's group; nodes and infrastructure get their own
//!   groups.
//! - `Host`: the whole cluster is one group, namespaces become hosts in it,
//!   and workloads become checks on their namespace's host.

use std::collections::BTreeMap;

use crds::{Check, CheckSpec, Host, HostGroup, HostGroupSpec, HostSpec, EMPTY_NAME};
use k8s_openapi::api::core::v1::{ComponentStatus, Namespace, Node};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::config::{annotations, vars, CHECK_COMMAND, DUMMY_COMMAND, SYSTEM_NAMESPACE};
use crate::controller::Controller;
use crate::dsr::{make_object_meta, make_owner_ref};
use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    HostGroup,
    Host,
}

impl Mapping {
    pub fn name(&self) -> &'static str {
        match self {
            Mapping::HostGroup => "hostgroup",
            Mapping::Host => "host",
        }
    }

    /// Cluster-level container. The host-group policy has no explicit
    /// cluster object; the host policy keeps one group for the whole
    /// cluster, named `cluster.<tag>`.
    pub async fn monitor_cluster(&self, c: &Controller) -> Result<(), ControllerError> {
        match self {
            Mapping::HostGroup => Ok(()),
            Mapping::Host => {
                let kube_system = c.system_namespace()?;
                c.reconcile_host_group(HostGroup {
                    metadata: ObjectMeta {
                        name: Some(format!("cluster.{}", c.tag)),
                        namespace: Some(SYSTEM_NAMESPACE.to_string()),
                        owner_references: Some(make_owner_ref(
                            kube_system.as_ref(),
                            "Namespace",
                            "v1",
                        )),
                        ..ObjectMeta::default()
                    },
                    spec: HostGroupSpec {
                        name: EMPTY_NAME.to_string(),
                        vars: c.make_vars(kube_system.as_ref(), "namespace", false),
                    },
                })
                .await
            }
        }
    }

    pub async fn monitor_namespace(
        &self,
        c: &Controller,
        namespace: &Namespace,
    ) -> Result<(), ControllerError> {
        match self {
            Mapping::HostGroup => {
                c.reconcile_host_group(HostGroup {
                    metadata: make_object_meta(namespace, "Namespace", "v1", "", true),
                    spec: HostGroupSpec {
                        name: namespace.name_any(),
                        vars: c.make_vars(namespace, "namespace", false),
                    },
                })
                .await
            }
            Mapping::Host => {
                c.reconcile_host(Host {
                    metadata: make_object_meta(namespace, "Namespace", "v1", "", true),
                    spec: HostSpec {
                        name: namespace.name_any(),
                        hostgroups: vec![EMPTY_NAME.to_string()],
                        check_command: DUMMY_COMMAND.to_string(),
                        vars: c.make_vars(namespace, "namespace", false),
                        ..HostSpec::default()
                    },
                })
                .await
            }
        }
    }

    pub async fn unmonitor_namespace(
        &self,
        c: &Controller,
        namespace: &Namespace,
    ) -> Result<(), ControllerError> {
        match self {
            Mapping::HostGroup => {
                c.delete_host_group(SYSTEM_NAMESPACE, &namespace.name_any())
                    .await
            }
            Mapping::Host => c.delete_host(SYSTEM_NAMESPACE, &namespace.name_any()).await,
        }
    }

    pub async fn monitor_nodes_group(&self, c: &Controller) -> Result<(), ControllerError> {
        self.monitor_collection_group(c, "nodes").await
    }

    pub async fn monitor_infrastructure_group(
        &self,
        c: &Controller,
    ) -> Result<(), ControllerError> {
        self.monitor_collection_group(c, "infrastructure").await
    }

    /// The nodes and infrastructure collections, owned by the system
    /// namespace.
    async fn monitor_collection_group(
        &self,
        c: &Controller,
        name: &str,
    ) -> Result<(), ControllerError> {
        let kube_system = c.system_namespace()?;
        let mut group_vars = BTreeMap::new();
        group_vars.insert(vars::CLUSTER.to_string(), c.tag.clone());

        let metadata = ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            owner_references: Some(make_owner_ref(kube_system.as_ref(), "Namespace", "v1")),
            ..ObjectMeta::default()
        };

        match self {
            Mapping::HostGroup => {
                c.reconcile_host_group(HostGroup {
                    metadata,
                    spec: HostGroupSpec {
                        name: name.to_string(),
                        vars: group_vars,
                    },
                })
                .await
            }
            Mapping::Host => {
                c.reconcile_host(Host {
                    metadata,
                    spec: HostSpec {
                        name: name.to_string(),
                        check_command: DUMMY_COMMAND.to_string(),
                        hostgroups: vec![EMPTY_NAME.to_string()],
                        vars: group_vars,
                        ..HostSpec::default()
                    },
                })
                .await
            }
        }
    }

    pub async fn monitor_node(&self, c: &Controller, node: &Node) -> Result<(), ControllerError> {
        match self {
            Mapping::HostGroup => {
                c.reconcile_host(Host {
                    metadata: make_object_meta(node, "Node", "v1", "", true),
                    spec: HostSpec {
                        name: format!("nodes.{}", node.name_any()),
                        check_command: CHECK_COMMAND.to_string(),
                        hostgroups: vec!["nodes".to_string()],
                        vars: c.make_vars(node, "node", false),
                        ..HostSpec::default()
                    },
                })
                .await
            }
            Mapping::Host => {
                c.reconcile_check(Check {
                    metadata: make_object_meta(node, "Node", "v1", "", true),
                    spec: CheckSpec {
                        name: node.name_any(),
                        host: "nodes".to_string(),
                        check_command: CHECK_COMMAND.to_string(),
                        vars: c.make_vars(node, "node", false),
                        ..CheckSpec::default()
                    },
                })
                .await
            }
        }
    }

    pub async fn unmonitor_node(&self, c: &Controller, node: &Node) -> Result<(), ControllerError> {
        match self {
            Mapping::HostGroup => c.delete_host(SYSTEM_NAMESPACE, &node.name_any()).await,
            Mapping::Host => c.delete_check(SYSTEM_NAMESPACE, &node.name_any()).await,
        }
    }

    pub async fn monitor_component_status(
        &self,
        c: &Controller,
        cs: &ComponentStatus,
    ) -> Result<(), ControllerError> {
        let record_name = format!("cs-{}", cs.name_any());
        let metadata = ObjectMeta {
            name: Some(record_name.clone()),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            owner_references: Some(make_owner_ref(cs, "ComponentStatus", "v1")),
            ..ObjectMeta::default()
        };

        match self {
            Mapping::HostGroup => {
                c.reconcile_host(Host {
                    metadata,
                    spec: HostSpec {
                        name: format!("infrastructure.{record_name}"),
                        hostgroups: vec!["infrastructure".to_string()],
                        check_command: CHECK_COMMAND.to_string(),
                        vars: c.make_vars(cs, "componentstatus", false),
                        ..HostSpec::default()
                    },
                })
                .await
            }
            Mapping::Host => {
                c.reconcile_check(Check {
                    metadata,
                    spec: CheckSpec {
                        name: record_name,
                        host: "infrastructure".to_string(),
                        check_command: CHECK_COMMAND.to_string(),
                        vars: c.make_vars(cs, "componentstatus", false),
                        ..CheckSpec::default()
                    },
                })
                .await
            }
        }
    }

    /// ComponentStatuses cannot be watched, so nothing calls this today;
    /// it completes the mapping's operation set.
    #[allow(dead_code)]
    pub async fn unmonitor_component_status(
        &self,
        c: &Controller,
        cs: &ComponentStatus,
    ) -> Result<(), ControllerError> {
        let record_name = format!("cs-{}", cs.name_any());
        match self {
            Mapping::HostGroup => c.delete_host(SYSTEM_NAMESPACE, &record_name).await,
            Mapping::Host => c.delete_check(SYSTEM_NAMESPACE, &record_name).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn monitor_workload<K: ResourceExt>(
        &self,
        c: &Controller,
        o: &K,
        abbrev: &str,
        type_label: &str,
        kind: &str,
        api_version: &str,
    ) -> Result<(), ControllerError> {
        let namespace = o.namespace().unwrap_or_default();
        let notes = annotation(o, annotations::NOTES);
        let notes_url = annotation(o, annotations::NOTES_URL);

        match self {
            Mapping::HostGroup => {
                c.reconcile_host(Host {
                    metadata: make_object_meta(o, kind, api_version, abbrev, false),
                    spec: HostSpec {
                        name: format!("{}.{}-{}", namespace, abbrev, o.name_any()),
                        hostgroups: vec![namespace],
                        check_command: CHECK_COMMAND.to_string(),
                        vars: c.make_vars(o, type_label, true),
                        notes,
                        notes_url,
                    },
                })
                .await
            }
            Mapping::Host => {
                c.reconcile_check(Check {
                    metadata: make_object_meta(o, kind, api_version, abbrev, false),
                    spec: CheckSpec {
                        name: format!("{}-{}", abbrev, o.name_any()),
                        host: namespace,
                        check_command: CHECK_COMMAND.to_string(),
                        vars: c.make_vars(o, type_label, true),
                        notes,
                        notes_url,
                    },
                })
                .await
            }
        }
    }

    pub async fn unmonitor_workload<K: ResourceExt>(
        &self,
        c: &Controller,
        o: &K,
        abbrev: &str,
    ) -> Result<(), ControllerError> {
        let namespace = o.namespace().unwrap_or_default();
        let record_name = format!("{}-{}", abbrev, o.name_any());
        match self {
            Mapping::HostGroup => c.delete_host(&namespace, &record_name).await,
            Mapping::Host => c.delete_check(&namespace, &record_name).await,
        }
    }
}

fn annotation<K: ResourceExt>(o: &K, key: &str) -> String {
    o.annotations().get(key).cloned().unwrap_or_default()
}
