//! Per-kind reconcilers for watched cluster objects.
//!
//! Each watched kind has a `*_created_or_updated` handler driven by the
//! work queue and a `*_deleted` handler invoked synchronously from the
//! watch loop. All of them dispatch through the selected mapping.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::ResourceExt;
use tracing::debug;

use crate::controller::Controller;
use crate::error::ControllerError;

impl Controller {
    pub(crate) async fn pod_created_or_updated(&self, pod: &Pod) -> Result<(), ControllerError> {
        self.process_workload(pod, "po", "pod", "Pod", "v1").await
    }

    pub(crate) async fn pod_deleted(&self, pod: &Pod) -> Result<(), ControllerError> {
        debug!(
            "processing deleted pod '{}/{}'",
            pod.namespace().unwrap_or_default(),
            pod.name_any()
        );
        self.mapping.unmonitor_workload(self, pod, "po").await
    }

    pub(crate) async fn node_created_or_updated(&self, node: &Node) -> Result<(), ControllerError> {
        debug!("processing node '{}'", node.name_any());
        if self.monitored(node) {
            self.mapping.monitor_node(self, node).await
        } else {
            self.mapping.unmonitor_node(self, node).await
        }
    }

    // Node deletions are not handled in the watch path. They are rare, and
    // a stale node record is swept by the housekeeper.

    pub(crate) async fn namespace_created_or_updated(
        &self,
        namespace: &Namespace,
    ) -> Result<(), ControllerError> {
        debug!("processing namespace '{}'", namespace.name_any());
        if self.monitored(namespace) {
            self.mapping.monitor_namespace(self, namespace).await
        } else {
            self.mapping.unmonitor_namespace(self, namespace).await
        }
    }

    pub(crate) async fn namespace_deleted(
        &self,
        namespace: &Namespace,
    ) -> Result<(), ControllerError> {
        debug!("processing deleted namespace '{}'", namespace.name_any());
        self.mapping.unmonitor_namespace(self, namespace).await
    }

    pub(crate) async fn deployment_created_or_updated(
        &self,
        deployment: &Deployment,
    ) -> Result<(), ControllerError> {
        self.process_workload(deployment, "deploy", "deployment", "Deployment", "apps/v1")
            .await
    }

    pub(crate) async fn deployment_deleted(
        &self,
        deployment: &Deployment,
    ) -> Result<(), ControllerError> {
        debug!(
            "processing deleted deployment '{}/{}'",
            deployment.namespace().unwrap_or_default(),
            deployment.name_any()
        );
        self.mapping
            .unmonitor_workload(self, deployment, "deploy")
            .await
    }

    pub(crate) async fn daemon_set_created_or_updated(
        &self,
        daemon_set: &DaemonSet,
    ) -> Result<(), ControllerError> {
        self.process_workload(daemon_set, "ds", "daemonset", "DaemonSet", "apps/v1")
            .await
    }

    pub(crate) async fn daemon_set_deleted(
        &self,
        daemon_set: &DaemonSet,
    ) -> Result<(), ControllerError> {
        debug!(
            "processing deleted daemonset '{}/{}'",
            daemon_set.namespace().unwrap_or_default(),
            daemon_set.name_any()
        );
        self.mapping.unmonitor_workload(self, daemon_set, "ds").await
    }

    pub(crate) async fn replica_set_created_or_updated(
        &self,
        replica_set: &ReplicaSet,
    ) -> Result<(), ControllerError> {
        self.process_workload(replica_set, "rs", "replicaset", "ReplicaSet", "apps/v1")
            .await
    }

    pub(crate) async fn replica_set_deleted(
        &self,
        replica_set: &ReplicaSet,
    ) -> Result<(), ControllerError> {
        debug!(
            "processing deleted replicaset '{}/{}'",
            replica_set.namespace().unwrap_or_default(),
            replica_set.name_any()
        );
        self.mapping.unmonitor_workload(self, replica_set, "rs").await
    }

    pub(crate) async fn stateful_set_created_or_updated(
        &self,
        stateful_set: &StatefulSet,
    ) -> Result<(), ControllerError> {
        self.process_workload(
            stateful_set,
            "statefulset",
            "statefulset",
            "StatefulSet",
            "apps/v1",
        )
        .await
    }

    pub(crate) async fn stateful_set_deleted(
        &self,
        stateful_set: &StatefulSet,
    ) -> Result<(), ControllerError> {
        debug!(
            "processing deleted statefulset '{}/{}'",
            stateful_set.namespace().unwrap_or_default(),
            stateful_set.name_any()
        );
        self.mapping
            .unmonitor_workload(self, stateful_set, "statefulset")
            .await
    }

    async fn process_workload<K: ResourceExt>(
        &self,
        o: &K,
        abbrev: &str,
        type_label: &str,
        kind: &str,
        api_version: &str,
    ) -> Result<(), ControllerError> {
        debug!(
            "processing {} '{}/{}'",
            type_label,
            o.namespace().unwrap_or_default(),
            o.name_any()
        );
        if self.monitored(o) {
            self.mapping
                .monitor_workload(self, o, abbrev, type_label, kind, api_version)
                .await
        } else {
            self.mapping.unmonitor_workload(self, o, abbrev).await
        }
    }
}
