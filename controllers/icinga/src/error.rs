//! Controller-specific error types.

use icinga_client::IcingaError;
use thiserror::Error;

/// Errors that can occur in the Icinga controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Icinga API error
    #[error("Icinga error: {0}")]
    Icinga(#[from] IcingaError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caches did not sync before the startup deadline
    #[error("timed out waiting for caches to sync")]
    CacheSync,

    /// The backend object belongs to another cluster controller.
    ///
    /// Workers drop the key instead of retrying: the object will stay
    /// foreign no matter how often we look at it.
    #[error("cannot modify '{name}': it is not managed by us ('{cluster}')")]
    NotManaged { name: String, cluster: String },

    /// An object required from the local cache is missing
    #[error("'{0}' not found in cache")]
    MissingFromCache(String),
}

impl ControllerError {
    /// True for ownership violations, which must not be retried
    pub fn is_ownership_violation(&self) -> bool {
        matches!(self, ControllerError::NotManaged { .. })
    }
}
