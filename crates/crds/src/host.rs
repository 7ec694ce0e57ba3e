//! Host CRD
//!
//! A checkable entity in the Icinga backend, member of one or more host
//! groups.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "icinga.monitoring.io",
    version = "v1",
    kind = "Host",
    plural = "hosts",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Backend object name, without the cluster tag prefix
    pub name: String,

    /// Custom variables attached to the backend object
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Host groups this host belongs to, without the cluster tag prefix
    #[serde(default)]
    pub hostgroups: Vec<String>,

    /// Check command executed for the host itself
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub check_command: String,

    /// Free-form operator notes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    /// Link to further documentation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes_url: String,
}
