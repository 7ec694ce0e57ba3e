//! Icinga client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Icinga2 API
#[derive(Debug, Error)]
pub enum IcingaError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Icinga2 API returned an error
    #[error("Icinga API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IcingaError {
    /// True if the error is the distinguishable not-found class
    pub fn is_not_found(&self) -> bool {
        matches!(self, IcingaError::NotFound(_))
    }
}
