//! Mock IcingaClient for unit testing
//!
//! In-memory implementation of `IcingaClientTrait` that stores objects in
//! maps keyed by object name (full name for services). Tests can preload
//! objects, inspect the stores and read write counters to assert that a
//! reconciliation pass performed no writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::IcingaError;
use crate::icinga_trait::IcingaClientTrait;
use crate::models::{Host, HostGroup, Service};

/// Counters over mutating calls, for idempotence assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

/// Mock Icinga client for testing
#[derive(Clone, Default)]
pub struct MockIcingaClient {
    pub host_groups: Arc<Mutex<HashMap<String, HostGroup>>>,
    pub hosts: Arc<Mutex<HashMap<String, Host>>>,
    pub services: Arc<Mutex<HashMap<String, Service>>>,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MockIcingaClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a host group (for test setup)
    pub fn add_host_group(&self, hg: HostGroup) {
        self.host_groups
            .lock()
            .unwrap()
            .insert(hg.name.clone(), hg);
    }

    /// Preload a host (for test setup)
    pub fn add_host(&self, host: Host) {
        self.hosts.lock().unwrap().insert(host.name.clone(), host);
    }

    /// Preload a service (for test setup)
    pub fn add_service(&self, service: Service) {
        self.services
            .lock()
            .unwrap()
            .insert(service.full_name(), service);
    }

    /// Make every mutating call fail with an API error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the write counters
    pub fn write_counts(&self) -> WriteCounts {
        WriteCounts {
            creates: self.creates.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }

    /// Reset the write counters
    pub fn reset_counts(&self) {
        self.creates.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    fn check_writable(&self, what: &str) -> Result<(), IcingaError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(IcingaError::Api(format!("{what}: injected failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl IcingaClientTrait for MockIcingaClient {
    async fn list_host_groups(&self) -> Result<Vec<HostGroup>, IcingaError> {
        Ok(self.host_groups.lock().unwrap().values().cloned().collect())
    }

    async fn get_host_group(&self, name: &str) -> Result<HostGroup, IcingaError> {
        self.host_groups
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IcingaError::NotFound(format!("hostgroup '{name}'")))
    }

    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError> {
        self.check_writable("create hostgroup")?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.host_groups
            .lock()
            .unwrap()
            .insert(hg.name.clone(), hg.clone());
        Ok(())
    }

    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError> {
        self.check_writable("update hostgroup")?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.host_groups
            .lock()
            .unwrap()
            .insert(hg.name.clone(), hg.clone());
        Ok(())
    }

    async fn delete_host_group(&self, name: &str) -> Result<(), IcingaError> {
        self.check_writable("delete hostgroup")?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.host_groups.lock().unwrap().remove(name);
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, IcingaError> {
        Ok(self.hosts.lock().unwrap().values().cloned().collect())
    }

    async fn get_host(&self, name: &str) -> Result<Host, IcingaError> {
        self.hosts
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IcingaError::NotFound(format!("host '{name}'")))
    }

    async fn create_host(&self, host: &Host) -> Result<(), IcingaError> {
        self.check_writable("create host")?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.hosts
            .lock()
            .unwrap()
            .insert(host.name.clone(), host.clone());
        Ok(())
    }

    async fn update_host(&self, host: &Host) -> Result<(), IcingaError> {
        self.check_writable("update host")?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.hosts
            .lock()
            .unwrap()
            .insert(host.name.clone(), host.clone());
        Ok(())
    }

    async fn delete_host(&self, name: &str) -> Result<(), IcingaError> {
        self.check_writable("delete host")?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().unwrap().remove(name);
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<Service>, IcingaError> {
        Ok(self.services.lock().unwrap().values().cloned().collect())
    }

    async fn get_service(&self, full_name: &str) -> Result<Service, IcingaError> {
        self.services
            .lock()
            .unwrap()
            .get(full_name)
            .cloned()
            .ok_or_else(|| IcingaError::NotFound(format!("service '{full_name}'")))
    }

    async fn create_service(&self, service: &Service) -> Result<(), IcingaError> {
        self.check_writable("create service")?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.services
            .lock()
            .unwrap()
            .insert(service.full_name(), service.clone());
        Ok(())
    }

    async fn update_service(&self, service: &Service) -> Result<(), IcingaError> {
        self.check_writable("update service")?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.services
            .lock()
            .unwrap()
            .insert(service.full_name(), service.clone());
        Ok(())
    }

    async fn delete_service(&self, full_name: &str) -> Result<(), IcingaError> {
        self.check_writable("delete service")?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.services.lock().unwrap().remove(full_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_after_create() {
        let mock = MockIcingaClient::new();
        let hg = HostGroup {
            name: "testing.default".to_string(),
            vars: Default::default(),
        };
        mock.create_host_group(&hg).await.unwrap();
        assert_eq!(mock.get_host_group("testing.default").await.unwrap(), hg);
        assert_eq!(mock.write_counts().creates, 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let mock = MockIcingaClient::new();
        let err = mock.get_host("testing.gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn services_are_keyed_by_full_name() {
        let mock = MockIcingaClient::new();
        let svc = Service {
            name: "http-check".to_string(),
            host_name: "testing.myhost".to_string(),
            ..Service::default()
        };
        mock.create_service(&svc).await.unwrap();
        assert!(mock.get_service("testing.myhost!http-check").await.is_ok());
        mock.delete_service("testing.myhost!http-check")
            .await
            .unwrap();
        assert!(mock
            .get_service("testing.myhost!http-check")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn injected_failures() {
        let mock = MockIcingaClient::new();
        mock.set_fail_writes(true);
        let err = mock
            .create_host(&Host {
                name: "testing.x".to_string(),
                ..Host::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IcingaError::Api(_)));
        assert_eq!(mock.write_counts().total(), 0);
    }
}
