//! Shared helpers for unit tests.
//!
//! `test_controller` builds a controller wired to the in-memory Icinga
//! mock and an in-memory DSR store, with reflector stores tests can
//! populate through the returned writer. The three standard namespaces
//! exist up front, like they would in any real cluster.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crds::{Check, Host, HostGroup};
use icinga_client::MockIcingaClient;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use kube_runtime::reflector;
use kube_runtime::reflector::store::Writer;
use kube_runtime::watcher;

use crate::backoff::RetryPolicy;
use crate::config::SYSTEM_NAMESPACE;
use crate::controller::{Controller, Queues, Stores};
use crate::dsr::DsrApi;
use crate::events::Recorder;
use crate::mapping::Mapping;

/// In-memory `DsrApi`, the stand-in for the cluster's DSR storage.
#[derive(Default)]
pub(crate) struct MemoryDsrApi {
    host_groups: Mutex<HashMap<(String, String), HostGroup>>,
    hosts: Mutex<HashMap<(String, String), Host>>,
    checks: Mutex<HashMap<(String, String), Check>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    fail_gets: AtomicBool,
}

fn record_key<K: ResourceExt>(o: &K) -> (String, String) {
    (
        o.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into()),
        o.name_any(),
    )
}

fn internal_error() -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: "injected failure".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

impl MemoryDsrApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_host_group(&self, hg: HostGroup) {
        self.host_groups.lock().unwrap().insert(record_key(&hg), hg);
    }

    pub fn insert_host(&self, host: Host) {
        self.hosts.lock().unwrap().insert(record_key(&host), host);
    }

    pub fn insert_check(&self, check: Check) {
        self.checks.lock().unwrap().insert(record_key(&check), check);
    }

    pub fn remove_host_group(&self, ns: &str, name: &str) {
        self.host_groups
            .lock()
            .unwrap()
            .remove(&(ns.to_string(), name.to_string()));
    }

    pub fn remove_host(&self, ns: &str, name: &str) {
        self.hosts
            .lock()
            .unwrap()
            .remove(&(ns.to_string(), name.to_string()));
    }

    pub fn remove_check(&self, ns: &str, name: &str) {
        self.checks
            .lock()
            .unwrap()
            .remove(&(ns.to_string(), name.to_string()));
    }

    pub fn all_host_groups(&self) -> Vec<HostGroup> {
        self.host_groups.lock().unwrap().values().cloned().collect()
    }

    pub fn all_hosts(&self) -> Vec<Host> {
        self.hosts.lock().unwrap().values().cloned().collect()
    }

    pub fn all_checks(&self) -> Vec<Check> {
        self.checks.lock().unwrap().values().cloned().collect()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    fn check_readable(&self) -> Result<(), kube::Error> {
        if self.fail_gets.load(Ordering::SeqCst) {
            Err(internal_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl DsrApi for MemoryDsrApi {
    async fn get_host_group(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<HostGroup>, kube::Error> {
        self.check_readable()?;
        Ok(self
            .host_groups
            .lock()
            .unwrap()
            .get(&(ns.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.insert_host_group(hg.clone());
        Ok(())
    }

    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.insert_host_group(hg.clone());
        Ok(())
    }

    async fn delete_host_group(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.remove_host_group(ns, name);
        Ok(())
    }

    async fn get_host(&self, ns: &str, name: &str) -> Result<Option<Host>, kube::Error> {
        self.check_readable()?;
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .get(&(ns.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_host(&self, host: &Host) -> Result<(), kube::Error> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.insert_host(host.clone());
        Ok(())
    }

    async fn update_host(&self, host: &Host) -> Result<(), kube::Error> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.insert_host(host.clone());
        Ok(())
    }

    async fn delete_host(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.remove_host(ns, name);
        Ok(())
    }

    async fn get_check(&self, ns: &str, name: &str) -> Result<Option<Check>, kube::Error> {
        self.check_readable()?;
        Ok(self
            .checks
            .lock()
            .unwrap()
            .get(&(ns.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_check(&self, check: &Check) -> Result<(), kube::Error> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.insert_check(check.clone());
        Ok(())
    }

    async fn update_check(&self, check: &Check) -> Result<(), kube::Error> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.insert_check(check.clone());
        Ok(())
    }

    async fn delete_check(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.remove_check(ns, name);
        Ok(())
    }
}

pub(crate) struct TestContext {
    pub controller: Arc<Controller>,
    pub icinga: MockIcingaClient,
    pub dsr: Arc<MemoryDsrApi>,
    pub namespaces: Writer<Namespace>,
}

impl TestContext {
    pub fn add_namespace(&mut self, ns: Namespace) {
        self.namespaces
            .apply_watcher_event(&watcher::Event::Apply(ns));
    }
}

pub(crate) fn test_controller(mapping: Mapping) -> TestContext {
    test_controller_with_defaults(mapping, BTreeMap::new())
}

pub(crate) fn test_controller_with_defaults(
    mapping: Mapping,
    default_vars: BTreeMap<String, String>,
) -> TestContext {
    let icinga = MockIcingaClient::new();
    let dsr = Arc::new(MemoryDsrApi::new());

    let (pods, _pods_w) = reflector::store();
    let (nodes, _nodes_w) = reflector::store();
    let (namespaces, mut namespaces_w) = reflector::store();
    let (deployments, _deployments_w) = reflector::store();
    let (daemon_sets, _daemon_sets_w) = reflector::store();
    let (replica_sets, _replica_sets_w) = reflector::store();
    let (stateful_sets, _stateful_sets_w) = reflector::store();
    let (host_groups, _host_groups_w) = reflector::store();
    let (hosts, _hosts_w) = reflector::store();
    let (checks, _checks_w) = reflector::store();

    for name in ["default", SYSTEM_NAMESPACE, "kube-public"] {
        namespaces_w.apply_watcher_event(&watcher::Event::Apply(namespace(name)));
    }

    let controller = Arc::new(Controller {
        client: None,
        icinga: Arc::new(icinga.clone()),
        dsr: dsr.clone(),
        recorder: Recorder::disabled(),
        stores: Stores {
            pods,
            nodes,
            namespaces,
            deployments,
            daemon_sets,
            replica_sets,
            stateful_sets,
            host_groups,
            hosts,
            checks,
        },
        writers: Mutex::new(None),
        queues: Queues::new(&RetryPolicy::default()),
        tag: "testing".to_string(),
        default_vars,
        mapping,
    });

    TestContext {
        controller,
        icinga,
        dsr,
        namespaces: namespaces_w,
    }
}

// Object fixtures, in the shape the watch would deliver them.

pub(crate) fn object_meta(ns: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: ns.map(str::to_string),
        uid: Some(format!("uid-{name}")),
        ..ObjectMeta::default()
    }
}

pub(crate) fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: object_meta(None, name),
        ..Namespace::default()
    }
}

pub(crate) fn namespace_with_annotations(name: &str, pairs: &[(&str, &str)]) -> Namespace {
    let mut ns = namespace(name);
    ns.metadata.annotations = Some(annotations(pairs));
    ns
}

pub(crate) fn pod(ns: &str, name: &str) -> Pod {
    Pod {
        metadata: object_meta(Some(ns), name),
        ..Pod::default()
    }
}

pub(crate) fn pod_with_owner(ns: &str, name: &str, owner_kind: &str, owner_name: &str) -> Pod {
    let mut pod = pod(ns, name);
    pod.metadata.owner_references = Some(vec![OwnerReference {
        kind: owner_kind.to_string(),
        name: owner_name.to_string(),
        ..OwnerReference::default()
    }]);
    pod
}

pub(crate) fn deployment(ns: &str, name: &str) -> Deployment {
    Deployment {
        metadata: object_meta(Some(ns), name),
        ..Deployment::default()
    }
}

pub(crate) fn deployment_with_annotations(
    ns: &str,
    name: &str,
    pairs: &[(&str, &str)],
) -> Deployment {
    let mut deployment = deployment(ns, name);
    deployment.metadata.annotations = Some(annotations(pairs));
    deployment
}

pub(crate) fn node(name: &str) -> Node {
    Node {
        metadata: object_meta(None, name),
        ..Node::default()
    }
}
