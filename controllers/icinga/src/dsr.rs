//! Desired-state record access.
//!
//! The `DsrApi` trait wraps CRUD on the three DSR kinds so the reconcilers
//! can be unit tested against an in-memory implementation, the same way the
//! backend client is mocked. Get returns `None` for a missing record and
//! delete treats not-found as success.

use crds::{Check, Host, HostGroup};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::config::SYSTEM_NAMESPACE;
use crate::controller::Controller;
use crate::error::ControllerError;

#[async_trait::async_trait]
pub trait DsrApi: Send + Sync {
    async fn get_host_group(&self, ns: &str, name: &str)
        -> Result<Option<HostGroup>, kube::Error>;
    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error>;
    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error>;
    async fn delete_host_group(&self, ns: &str, name: &str) -> Result<(), kube::Error>;

    async fn get_host(&self, ns: &str, name: &str) -> Result<Option<Host>, kube::Error>;
    async fn create_host(&self, host: &Host) -> Result<(), kube::Error>;
    async fn update_host(&self, host: &Host) -> Result<(), kube::Error>;
    async fn delete_host(&self, ns: &str, name: &str) -> Result<(), kube::Error>;

    async fn get_check(&self, ns: &str, name: &str) -> Result<Option<Check>, kube::Error>;
    async fn create_check(&self, check: &Check) -> Result<(), kube::Error>;
    async fn update_check(&self, check: &Check) -> Result<(), kube::Error>;
    async fn delete_check(&self, ns: &str, name: &str) -> Result<(), kube::Error>;
}

/// `DsrApi` backed by the cluster API
pub struct KubeDsrApi {
    client: Client,
}

impl KubeDsrApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, ns: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), ns)
    }
}

fn absorb_not_found<T>(result: Result<T, kube::Error>) -> Result<Option<T>, kube::Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait::async_trait]
impl DsrApi for KubeDsrApi {
    async fn get_host_group(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<Option<HostGroup>, kube::Error> {
        absorb_not_found(self.api::<HostGroup>(ns).get(name).await)
    }

    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error> {
        let ns = hg.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<HostGroup>(&ns)
            .create(&PostParams::default(), hg)
            .await
            .map(|_| ())
    }

    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), kube::Error> {
        let ns = hg.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<HostGroup>(&ns)
            .replace(&hg.name_any(), &PostParams::default(), hg)
            .await
            .map(|_| ())
    }

    async fn delete_host_group(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        absorb_not_found(
            self.api::<HostGroup>(ns)
                .delete(name, &DeleteParams::default())
                .await,
        )
        .map(|_| ())
    }

    async fn get_host(&self, ns: &str, name: &str) -> Result<Option<Host>, kube::Error> {
        absorb_not_found(self.api::<Host>(ns).get(name).await)
    }

    async fn create_host(&self, host: &Host) -> Result<(), kube::Error> {
        let ns = host.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<Host>(&ns)
            .create(&PostParams::default(), host)
            .await
            .map(|_| ())
    }

    async fn update_host(&self, host: &Host) -> Result<(), kube::Error> {
        let ns = host.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<Host>(&ns)
            .replace(&host.name_any(), &PostParams::default(), host)
            .await
            .map(|_| ())
    }

    async fn delete_host(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        absorb_not_found(
            self.api::<Host>(ns)
                .delete(name, &DeleteParams::default())
                .await,
        )
        .map(|_| ())
    }

    async fn get_check(&self, ns: &str, name: &str) -> Result<Option<Check>, kube::Error> {
        absorb_not_found(self.api::<Check>(ns).get(name).await)
    }

    async fn create_check(&self, check: &Check) -> Result<(), kube::Error> {
        let ns = check.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<Check>(&ns)
            .create(&PostParams::default(), check)
            .await
            .map(|_| ())
    }

    async fn update_check(&self, check: &Check) -> Result<(), kube::Error> {
        let ns = check.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        self.api::<Check>(&ns)
            .replace(&check.name_any(), &PostParams::default(), check)
            .await
            .map(|_| ())
    }

    async fn delete_check(&self, ns: &str, name: &str) -> Result<(), kube::Error> {
        absorb_not_found(
            self.api::<Check>(ns)
                .delete(name, &DeleteParams::default())
                .await,
        )
        .map(|_| ())
    }
}

/// Owner reference pointing a DSR at the cluster object it represents
pub(crate) fn make_owner_ref<K: ResourceExt>(
    o: &K,
    kind: &str,
    api_version: &str,
) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: o.name_any(),
        uid: o.uid().unwrap_or_default(),
        ..OwnerReference::default()
    }]
}

/// Metadata for a DSR derived from a cluster object. DSRs for
/// cluster-scoped objects live in the system namespace; namespaced
/// workloads keep their DSR next to them, prefixed with the kind abbrev.
pub(crate) fn make_object_meta<K: ResourceExt>(
    o: &K,
    kind: &str,
    api_version: &str,
    abbrev: &str,
    system: bool,
) -> ObjectMeta {
    let namespace = if system {
        SYSTEM_NAMESPACE.to_string()
    } else {
        o.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into())
    };

    let name = if abbrev.is_empty() {
        o.name_any()
    } else {
        format!("{}-{}", abbrev, o.name_any())
    };

    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace),
        owner_references: Some(make_owner_ref(o, kind, api_version)),
        ..ObjectMeta::default()
    }
}

impl Controller {
    /// Idempotent upsert of a HostGroup record. Writing the mutated
    /// observed object keeps the server-assigned resourceVersion and uid.
    pub(crate) async fn reconcile_host_group(
        &self,
        desired: HostGroup,
    ) -> Result<(), ControllerError> {
        let ns = desired.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        let name = desired.name_any();

        match self.dsr.get_host_group(&ns, &name).await? {
            Some(mut observed) => {
                if observed.spec != desired.spec {
                    info!("updating hostgroup cr '{ns}/{name}'");
                    observed.spec = desired.spec;
                    self.dsr.update_host_group(&observed).await?;
                }
            }
            None => {
                info!("creating hostgroup cr '{ns}/{name}'");
                self.dsr.create_host_group(&desired).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn delete_host_group(
        &self,
        ns: &str,
        name: &str,
    ) -> Result<(), ControllerError> {
        debug!("deleting hostgroup cr '{ns}/{name}'");
        self.dsr.delete_host_group(ns, name).await?;
        Ok(())
    }

    pub(crate) async fn reconcile_host(&self, desired: Host) -> Result<(), ControllerError> {
        let ns = desired.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        let name = desired.name_any();

        match self.dsr.get_host(&ns, &name).await? {
            Some(mut observed) => {
                if observed.spec != desired.spec {
                    info!("updating host cr '{ns}/{name}'");
                    observed.spec = desired.spec;
                    self.dsr.update_host(&observed).await?;
                }
            }
            None => {
                info!("creating host cr '{ns}/{name}'");
                self.dsr.create_host(&desired).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn delete_host(&self, ns: &str, name: &str) -> Result<(), ControllerError> {
        debug!("deleting host cr '{ns}/{name}'");
        self.dsr.delete_host(ns, name).await?;
        Ok(())
    }

    pub(crate) async fn reconcile_check(&self, desired: Check) -> Result<(), ControllerError> {
        let ns = desired.namespace().unwrap_or_else(|| SYSTEM_NAMESPACE.into());
        let name = desired.name_any();

        match self.dsr.get_check(&ns, &name).await? {
            Some(mut observed) => {
                if observed.spec != desired.spec {
                    info!("updating check cr '{ns}/{name}'");
                    observed.spec = desired.spec;
                    self.dsr.update_check(&observed).await?;
                }
            }
            None => {
                info!("creating check cr '{ns}/{name}'");
                self.dsr.create_check(&desired).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn delete_check(&self, ns: &str, name: &str) -> Result<(), ControllerError> {
        debug!("deleting check cr '{ns}/{name}'");
        self.dsr.delete_check(ns, name).await?;
        Ok(())
    }
}
