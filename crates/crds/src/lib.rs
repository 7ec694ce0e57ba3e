//! Icinga CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Icinga controller.
//! Each resource describes one desired object in the Icinga backend:
//! - HostGroup: a logical container of hosts
//! - Host: a checkable entity, member of one or more host groups
//! - Check: a service-level probe attached to a host

pub mod check;
pub mod host;
pub mod host_group;

// Re-exports
pub use check::*;
pub use host::*;
pub use host_group::*;

/// Sentinel used in a spec `name` to produce a backend name consisting of
/// the cluster tag alone, with no `.<name>` suffix.
pub const EMPTY_NAME: &str = "<EMPTY>";
