//! HostGroup CRD
//!
//! A logical container of hosts in the Icinga backend. Host group resources
//! that represent namespaces all live in the system namespace.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "icinga.monitoring.io",
    version = "v1",
    kind = "HostGroup",
    plural = "hostgroups",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HostGroupSpec {
    /// Backend object name, without the cluster tag prefix
    pub name: String,

    /// Custom variables attached to the backend object
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}
