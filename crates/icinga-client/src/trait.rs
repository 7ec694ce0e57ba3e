//! IcingaClient trait for mocking
//!
//! This trait abstracts the IcingaClient to enable mocking in unit tests.
//! The concrete IcingaClient implements this trait, and tests use the
//! in-memory mock implementation.

use crate::error::IcingaError;
use crate::models::{Host, HostGroup, Service};

/// Trait for Icinga2 object API operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing
/// runtime. Get operations return the distinguishable
/// [`IcingaError::NotFound`] when the object does not exist.
#[async_trait::async_trait]
pub trait IcingaClientTrait: Send + Sync {
    // Host group operations
    async fn list_host_groups(&self) -> Result<Vec<HostGroup>, IcingaError>;
    async fn get_host_group(&self, name: &str) -> Result<HostGroup, IcingaError>;
    async fn create_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError>;
    async fn update_host_group(&self, hg: &HostGroup) -> Result<(), IcingaError>;
    async fn delete_host_group(&self, name: &str) -> Result<(), IcingaError>;

    // Host operations
    async fn list_hosts(&self) -> Result<Vec<Host>, IcingaError>;
    async fn get_host(&self, name: &str) -> Result<Host, IcingaError>;
    async fn create_host(&self, host: &Host) -> Result<(), IcingaError>;
    async fn update_host(&self, host: &Host) -> Result<(), IcingaError>;
    async fn delete_host(&self, name: &str) -> Result<(), IcingaError>;

    // Service operations, addressed by the full name `<host>!<service>`
    async fn list_services(&self) -> Result<Vec<Service>, IcingaError>;
    async fn get_service(&self, full_name: &str) -> Result<Service, IcingaError>;
    async fn create_service(&self, service: &Service) -> Result<(), IcingaError>;
    async fn update_service(&self, service: &Service) -> Result<(), IcingaError>;
    async fn delete_service(&self, full_name: &str) -> Result<(), IcingaError>;
}
