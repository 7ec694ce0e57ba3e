//! Icinga2 API models
//!
//! These models carry the subset of object attributes the controller reads
//! and writes. The object API wraps everything in a results envelope; the
//! envelope types live here too so the client and the mock share them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Custom variables attached to an Icinga object.
///
/// The API allows arbitrary JSON values here. The controller only ever writes
/// strings, but objects edited out-of-band may carry anything.
pub type Vars = BTreeMap<String, serde_json::Value>;

/// A host group object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,
    #[serde(default)]
    pub vars: Vars,
}

/// A host object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub check_command: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub notes_url: String,
    #[serde(default)]
    pub vars: Vars,
}

/// A service object, attached to a host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub host_name: String,
    #[serde(default)]
    pub check_command: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub notes_url: String,
    #[serde(default)]
    pub vars: Vars,
}

impl Service {
    /// The API-level object name, `<host>!<service>`
    pub fn full_name(&self) -> String {
        format!("{}!{}", self.host_name, self.name)
    }
}

/// Results envelope returned by every object API query
#[derive(Debug, Deserialize)]
pub struct ResultsEnvelope<T> {
    pub results: Vec<ObjectResult<T>>,
}

/// One entry of a results envelope
#[derive(Debug, Deserialize)]
pub struct ObjectResult<T> {
    pub name: String,
    pub attrs: T,
}

/// Wire attributes of a host group
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HostGroupAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vars>,
}

/// Wire attributes of a host
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HostAttrs {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vars>,
}

/// Wire attributes of a service
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServiceAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vars>,
}

/// Request body for create and modify calls, `{"attrs": ...}`
#[derive(Debug, Serialize)]
pub struct AttrsRequest<T> {
    pub attrs: T,
}

impl From<ObjectResult<HostGroupAttrs>> for HostGroup {
    fn from(r: ObjectResult<HostGroupAttrs>) -> Self {
        HostGroup {
            name: r.name,
            vars: r.attrs.vars.unwrap_or_default(),
        }
    }
}

impl From<ObjectResult<HostAttrs>> for Host {
    fn from(r: ObjectResult<HostAttrs>) -> Self {
        Host {
            name: r.name,
            groups: r.attrs.groups,
            check_command: r.attrs.check_command.unwrap_or_default(),
            notes: r.attrs.notes.unwrap_or_default(),
            notes_url: r.attrs.notes_url.unwrap_or_default(),
            vars: r.attrs.vars.unwrap_or_default(),
        }
    }
}

impl From<ObjectResult<ServiceAttrs>> for Service {
    fn from(r: ObjectResult<ServiceAttrs>) -> Self {
        // Service object names come back as "<host>!<service>".
        let (host_name, name) = match r.name.split_once('!') {
            Some((h, s)) => (h.to_string(), s.to_string()),
            None => (String::new(), r.name),
        };
        Service {
            name,
            host_name,
            check_command: r.attrs.check_command.unwrap_or_default(),
            notes: r.attrs.notes.unwrap_or_default(),
            notes_url: r.attrs.notes_url.unwrap_or_default(),
            vars: r.attrs.vars.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_full_name() {
        let svc = Service {
            name: "http-check".to_string(),
            host_name: "testing.myhost".to_string(),
            ..Service::default()
        };
        assert_eq!(svc.full_name(), "testing.myhost!http-check");
    }

    #[test]
    fn null_vars_deserialize_to_empty() {
        let json = r#"{"results":[{"name":"testing.default","attrs":{"vars":null}}]}"#;
        let envelope: ResultsEnvelope<HostGroupAttrs> =
            serde_json::from_str(json).expect("envelope should parse");
        let hg: HostGroup = envelope.results.into_iter().next().unwrap().into();
        assert_eq!(hg.name, "testing.default");
        assert!(hg.vars.is_empty());
    }
}
