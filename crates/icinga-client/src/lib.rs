//! Icinga2 REST API Client
//!
//! A client library for the Icinga2 object API, covering the object types the
//! controller manages: host groups, hosts and services.
//!
//! # Example
//!
//! ```no_run
//! use icinga_client::{IcingaClient, IcingaClientTrait, IcingaSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = IcingaClient::new(IcingaSettings {
//!     url: "https://icinga:5665".to_string(),
//!     username: "root".to_string(),
//!     password: "icinga".to_string(),
//!     debug: false,
//! })?;
//!
//! for host in client.list_hosts().await? {
//!     println!("{}", host.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! TLS certificate verification is disabled: Icinga2 instances ship with
//! self-signed certificates by default.

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod icinga_trait;
pub mod models;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{IcingaClient, IcingaSettings};
pub use error::IcingaError;
pub use icinga_trait::IcingaClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockIcingaClient;
pub use models::*;
