//! Check CRD
//!
//! A service-level probe attached to a host in the Icinga backend. The
//! backend service full name is `<tag>.<host>!<name>`.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "icinga.monitoring.io",
    version = "v1",
    kind = "Check",
    plural = "checks",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CheckSpec {
    /// Service name, unique per host
    pub name: String,

    /// Name of the host the service is attached to, without the tag prefix
    pub host: String,

    /// Check command executed for the service
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub check_command: String,

    /// Free-form operator notes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    /// Link to further documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes_url: String,

    /// Custom variables attached to the backend object
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}
