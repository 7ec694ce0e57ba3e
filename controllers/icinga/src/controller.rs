//! Main controller implementation.
//!
//! The `Controller` is the single long-lived object of the process: it
//! holds the clients, the reflector stores (the workers' read-only caches),
//! the per-kind work queues and the selected mapping. It is constructed
//! once at startup and shared by reference into every task.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crds::{Check, Host, HostGroup};
use icinga_client::IcingaClientTrait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::{Api, Client};
use kube_runtime::reflector;
use kube_runtime::reflector::store::Writer;
use kube_runtime::reflector::{ObjectRef, Store};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::config::{Config, SYSTEM_NAMESPACE};
use crate::dsr::{DsrApi, KubeDsrApi};
use crate::error::ControllerError;
use crate::events::Recorder;
use crate::mapping::Mapping;
use crate::watcher::{delete_handler, spawn_watch, split_key};
use crate::workqueue::WorkQueue;

/// How long startup waits for all caches before giving up.
const CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Read-only caches, one per watched kind.
pub(crate) struct Stores {
    pub pods: Store<Pod>,
    pub nodes: Store<Node>,
    pub namespaces: Store<Namespace>,
    pub deployments: Store<Deployment>,
    pub daemon_sets: Store<DaemonSet>,
    pub replica_sets: Store<ReplicaSet>,
    pub stateful_sets: Store<StatefulSet>,
    pub host_groups: Store<HostGroup>,
    pub hosts: Store<Host>,
    pub checks: Store<Check>,
}

/// The writer halves, consumed by `run` when the watchers start.
pub(crate) struct StoreWriters {
    pods: Writer<Pod>,
    nodes: Writer<Node>,
    namespaces: Writer<Namespace>,
    deployments: Writer<Deployment>,
    daemon_sets: Writer<DaemonSet>,
    replica_sets: Writer<ReplicaSet>,
    stateful_sets: Writer<StatefulSet>,
    host_groups: Writer<HostGroup>,
    hosts: Writer<Host>,
    checks: Writer<Check>,
}

/// Rate-limited queues, one per watched kind.
pub(crate) struct Queues {
    pub pods: Arc<WorkQueue>,
    pub nodes: Arc<WorkQueue>,
    pub namespaces: Arc<WorkQueue>,
    pub deployments: Arc<WorkQueue>,
    pub daemon_sets: Arc<WorkQueue>,
    pub replica_sets: Arc<WorkQueue>,
    pub stateful_sets: Arc<WorkQueue>,
    pub host_groups: Arc<WorkQueue>,
    pub hosts: Arc<WorkQueue>,
    pub checks: Arc<WorkQueue>,
}

impl Queues {
    pub(crate) fn new(policy: &RetryPolicy) -> Self {
        Self {
            pods: WorkQueue::new(policy.clone()),
            nodes: WorkQueue::new(policy.clone()),
            namespaces: WorkQueue::new(policy.clone()),
            deployments: WorkQueue::new(policy.clone()),
            daemon_sets: WorkQueue::new(policy.clone()),
            replica_sets: WorkQueue::new(policy.clone()),
            stateful_sets: WorkQueue::new(policy.clone()),
            host_groups: WorkQueue::new(policy.clone()),
            hosts: WorkQueue::new(policy.clone()),
            checks: WorkQueue::new(policy.clone()),
        }
    }

    fn all(&self) -> Vec<Arc<WorkQueue>> {
        vec![
            self.pods.clone(),
            self.nodes.clone(),
            self.namespaces.clone(),
            self.deployments.clone(),
            self.daemon_sets.clone(),
            self.replica_sets.clone(),
            self.stateful_sets.clone(),
            self.host_groups.clone(),
            self.hosts.clone(),
            self.checks.clone(),
        ]
    }
}

/// Main controller for projecting cluster state into Icinga.
pub struct Controller {
    pub(crate) client: Option<Client>,
    pub(crate) icinga: Arc<dyn IcingaClientTrait>,
    pub(crate) dsr: Arc<dyn DsrApi>,
    pub(crate) recorder: Recorder,
    pub(crate) stores: Stores,
    pub(crate) writers: Mutex<Option<StoreWriters>>,
    pub(crate) queues: Queues,
    pub(crate) tag: String,
    pub(crate) default_vars: BTreeMap<String, String>,
    pub(crate) mapping: Mapping,
}

impl Controller {
    /// Creates a new controller instance.
    pub fn new(client: Client, icinga: Arc<dyn IcingaClientTrait>, config: Config) -> Self {
        let (pods, pods_w) = reflector::store();
        let (nodes, nodes_w) = reflector::store();
        let (namespaces, namespaces_w) = reflector::store();
        let (deployments, deployments_w) = reflector::store();
        let (daemon_sets, daemon_sets_w) = reflector::store();
        let (replica_sets, replica_sets_w) = reflector::store();
        let (stateful_sets, stateful_sets_w) = reflector::store();
        let (host_groups, host_groups_w) = reflector::store();
        let (hosts, hosts_w) = reflector::store();
        let (checks, checks_w) = reflector::store();

        Self {
            dsr: Arc::new(KubeDsrApi::new(client.clone())),
            recorder: Recorder::new(client.clone()),
            client: Some(client),
            icinga,
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
            writers: Mutex::new(Some(StoreWriters {
                pods: pods_w,
                nodes: nodes_w,
                namespaces: namespaces_w,
                deployments: deployments_w,
                replica_sets: replica_sets_w,
                daemon_sets: daemon_sets_w,
                stateful_sets: stateful_sets_w,
                host_groups: host_groups_w,
                hosts: hosts_w,
                checks: checks_w,
            })),
            queues: Queues::new(&RetryPolicy::default()),
            tag: config.tag,
            default_vars: config.default_vars,
            mapping: config.mapping,
        }
    }

    /// The system namespace object, needed as the owner of cluster-scope
    /// records.
    pub(crate) fn system_namespace(&self) -> Result<Arc<Namespace>, ControllerError> {
        self.stores
            .namespaces
            .get(&ObjectRef::new(SYSTEM_NAMESPACE))
            .ok_or_else(|| {
                ControllerError::MissingFromCache(format!("namespace '{SYSTEM_NAMESPACE}'"))
            })
    }

    /// Runs the controller until the shutdown signal fires.
    ///
    /// Watchers start first; workers only start once every cache has
    /// synced. A sync timeout is fatal.
    pub async fn run(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ControllerError> {
        let client = self.client.clone().ok_or_else(|| {
            ControllerError::InvalidConfig("controller has no cluster client".to_string())
        })?;
        let writers = self
            .writers
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| {
                ControllerError::InvalidConfig("controller is already running".to_string())
            })?;

        info!("starting controller");

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(spawn_watch(
            self.clone(),
            Api::<Pod>::all(client.clone()),
            writers.pods,
            self.queues.pods.clone(),
            "pod",
            Some(delete_handler(|c: Arc<Controller>, pod: Pod| async move {
                c.pod_deleted(&pod).await
            })),
            shutdown.clone(),
        ));

        // Node deletions are rare and tombstone-safe; the housekeeper picks
        // up whatever the watch path misses.
        tasks.push(spawn_watch(
            self.clone(),
            Api::<Node>::all(client.clone()),
            writers.nodes,
            self.queues.nodes.clone(),
            "node",
            None,
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<Namespace>::all(client.clone()),
            writers.namespaces,
            self.queues.namespaces.clone(),
            "namespace",
            Some(delete_handler(|c: Arc<Controller>, ns: Namespace| async move {
                c.namespace_deleted(&ns).await
            })),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<Deployment>::all(client.clone()),
            writers.deployments,
            self.queues.deployments.clone(),
            "deployment",
            Some(delete_handler(
                |c: Arc<Controller>, deployment: Deployment| async move {
                    c.deployment_deleted(&deployment).await
                },
            )),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<DaemonSet>::all(client.clone()),
            writers.daemon_sets,
            self.queues.daemon_sets.clone(),
            "daemonset",
            Some(delete_handler(
                |c: Arc<Controller>, daemon_set: DaemonSet| async move {
                    c.daemon_set_deleted(&daemon_set).await
                },
            )),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<ReplicaSet>::all(client.clone()),
            writers.replica_sets,
            self.queues.replica_sets.clone(),
            "replicaset",
            Some(delete_handler(
                |c: Arc<Controller>, replica_set: ReplicaSet| async move {
                    c.replica_set_deleted(&replica_set).await
                },
            )),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<StatefulSet>::all(client.clone()),
            writers.stateful_sets,
            self.queues.stateful_sets.clone(),
            "statefulset",
            Some(delete_handler(
                |c: Arc<Controller>, stateful_set: StatefulSet| async move {
                    c.stateful_set_deleted(&stateful_set).await
                },
            )),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<HostGroup>::all(client.clone()),
            writers.host_groups,
            self.queues.host_groups.clone(),
            "hostgroup",
            Some(delete_handler(
                |c: Arc<Controller>, hostgroup: HostGroup| async move {
                    c.host_group_deleted(&hostgroup).await
                },
            )),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<Host>::all(client.clone()),
            writers.hosts,
            self.queues.hosts.clone(),
            "host",
            Some(delete_handler(|c: Arc<Controller>, host: Host| async move {
                c.host_deleted(&host).await
            })),
            shutdown.clone(),
        ));

        tasks.push(spawn_watch(
            self.clone(),
            Api::<Check>::all(client.clone()),
            writers.checks,
            self.queues.checks.clone(),
            "check",
            Some(delete_handler(|c: Arc<Controller>, check: Check| async move {
                c.check_deleted(&check).await
            })),
            shutdown.clone(),
        ));

        let synced = tokio::time::timeout(CACHE_SYNC_TIMEOUT, async {
            tokio::try_join!(
                self.stores.pods.wait_until_ready(),
                self.stores.nodes.wait_until_ready(),
                self.stores.namespaces.wait_until_ready(),
                self.stores.deployments.wait_until_ready(),
                self.stores.daemon_sets.wait_until_ready(),
                self.stores.replica_sets.wait_until_ready(),
                self.stores.stateful_sets.wait_until_ready(),
                self.stores.host_groups.wait_until_ready(),
                self.stores.hosts.wait_until_ready(),
                self.stores.checks.wait_until_ready(),
            )
        })
        .await;

        match synced {
            Ok(Ok(_)) => info!("caches synced"),
            _ => return Err(ControllerError::CacheSync),
        }

        debug!("starting workers");

        tasks.push(Self::spawn_worker(
            &self,
            "pod",
            self.queues.pods.clone(),
            self.stores.pods.clone(),
            |c, pod: Arc<Pod>| async move { c.pod_created_or_updated(&pod).await },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "node",
            self.queues.nodes.clone(),
            self.stores.nodes.clone(),
            |c, node: Arc<Node>| async move { c.node_created_or_updated(&node).await },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "namespace",
            self.queues.namespaces.clone(),
            self.stores.namespaces.clone(),
            |c, ns: Arc<Namespace>| async move { c.namespace_created_or_updated(&ns).await },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "deployment",
            self.queues.deployments.clone(),
            self.stores.deployments.clone(),
            |c, deployment: Arc<Deployment>| async move {
                c.deployment_created_or_updated(&deployment).await
            },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "daemonset",
            self.queues.daemon_sets.clone(),
            self.stores.daemon_sets.clone(),
            |c, daemon_set: Arc<DaemonSet>| async move {
                c.daemon_set_created_or_updated(&daemon_set).await
            },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "replicaset",
            self.queues.replica_sets.clone(),
            self.stores.replica_sets.clone(),
            |c, replica_set: Arc<ReplicaSet>| async move {
                c.replica_set_created_or_updated(&replica_set).await
            },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "statefulset",
            self.queues.stateful_sets.clone(),
            self.stores.stateful_sets.clone(),
            |c, stateful_set: Arc<StatefulSet>| async move {
                c.stateful_set_created_or_updated(&stateful_set).await
            },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "hostgroup",
            self.queues.host_groups.clone(),
            self.stores.host_groups.clone(),
            |c, hostgroup: Arc<HostGroup>| async move {
                c.host_group_created_or_updated(&hostgroup).await
            },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "host",
            self.queues.hosts.clone(),
            self.stores.hosts.clone(),
            |c, host: Arc<Host>| async move { c.host_created_or_updated(&host).await },
        ));
        tasks.push(Self::spawn_worker(
            &self,
            "check",
            self.queues.checks.clone(),
            self.stores.checks.clone(),
            |c, check: Arc<Check>| async move { c.check_created_or_updated(&check).await },
        ));

        tasks.push(tokio::spawn(self.clone().housekeeping_loop(shutdown.clone())));
        tasks.push(tokio::spawn(self.clone().defaults_loop(shutdown.clone())));

        // Shut the queues down when the signal fires so workers drain and
        // exit after their in-flight reconcile.
        {
            let queues = self.queues.all();
            let mut rx = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let _ = rx.changed().await;
                for queue in queues {
                    queue.shut_down();
                }
            }));
        }

        debug!("started workers");

        for task in tasks {
            let _ = task.await;
        }

        info!("controller stopped");
        Ok(())
    }

    fn spawn_worker<K, F, Fut>(
        controller: &Arc<Self>,
        kind: &'static str,
        queue: Arc<WorkQueue>,
        store: Store<K>,
        handler: F,
    ) -> JoinHandle<()>
    where
        K: kube::Resource + Clone + Send + Sync + 'static,
        K::DynamicType: Default + Eq + std::hash::Hash + Clone,
        F: Fn(Arc<Controller>, Arc<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        let controller = Arc::clone(controller);
        tokio::spawn(async move {
            while let Some(key) = queue.get().await {
                let object = {
                    let (ns, name) = split_key(&key);
                    let oref = match ns {
                        Some(ns) => ObjectRef::new(name).within(ns),
                        None => ObjectRef::new(name),
                    };
                    store.get(&oref)
                };

                match object {
                    // Dropped on purpose: the object is gone from the
                    // cache, and whatever removed it produced its own
                    // event.
                    None => {
                        debug!("{kind} '{key}' gone from cache, dropping");
                        queue.forget(&key);
                    }
                    Some(o) => match handler(controller.clone(), o).await {
                        Ok(()) => queue.forget(&key),
                        Err(e) if e.is_ownership_violation() => {
                            warn!("error syncing {kind} '{key}': {e}");
                            queue.forget(&key);
                        }
                        Err(e) => {
                            warn!("error syncing {kind} '{key}': {e}, requeueing");
                            queue.clone().add_rate_limited(key.clone());
                        }
                    },
                }
                queue.done(&key);
            }
            debug!("{kind} worker stopped");
        })
    }
}
