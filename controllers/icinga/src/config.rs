//! Configuration and well-known constants.
//!
//! All runtime configuration comes from environment variables; the
//! constants below are the controller's contract with annotations on
//! cluster objects and with variables on backend objects.

use std::collections::BTreeMap;
use std::env;

use icinga_client::IcingaSettings;

use crate::error::ControllerError;
use crate::mapping::Mapping;

/// Namespace holding DSRs for cluster-scoped objects
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Check command attached to monitored cluster objects
pub const CHECK_COMMAND: &str = "check_kubernetes";

/// Placeholder check command for container hosts in the Host mapping
pub const DUMMY_COMMAND: &str = "dummy";

/// Annotations recognized on cluster objects
pub mod annotations {
    /// Non-empty value disables monitoring for the object (or, on a
    /// namespace, for everything in it)
    pub const DISABLE_MONITORING: &str = "icinga.monitoring.io/nomonitoring";
    /// Free-form notes copied to the backend object
    pub const NOTES: &str = "icinga.monitoring.io/notes";
    /// Documentation link copied to the backend object
    pub const NOTES_URL: &str = "icinga.monitoring.io/notesurl";
}

/// Reserved variable keys on backend objects
pub mod vars {
    /// The controlling cluster's tag; ownership gate for every mutation
    pub const CLUSTER: &str = "kubernetes_cluster";
    /// Source object kind (`namespace`, `node`, `pod`, ...)
    pub const TYPE: &str = "kubernetes_type";
    /// Source object name
    pub const NAME: &str = "kubernetes_name";
    /// Source object namespace, blank for cluster-scoped objects
    pub const NAMESPACE: &str = "kubernetes_namespace";
    /// `<namespace>/<name>` of the DSR that produced the object
    pub const OWNER: &str = "kubernetes_owner";
}

/// Controller configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub tag: String,
    pub mapping: Mapping,
    pub default_vars: BTreeMap<String, String>,
    pub icinga: IcingaSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ControllerError> {
        let tag = match env::var("TAG") {
            Ok(t) if !t.is_empty() => t,
            _ => "kubernetes".to_string(),
        };

        let mapping = parse_mapping(env::var("MAPPING").unwrap_or_default().as_str());

        let default_vars = parse_default_vars(&env::var("DEFAULT_VARS").unwrap_or_default())?;

        let icinga = IcingaSettings {
            url: env::var("ICINGA_URL").unwrap_or_default(),
            username: env::var("ICINGA_USER").unwrap_or_default(),
            password: env::var("ICINGA_PASSWORD").unwrap_or_default(),
            debug: env::var("ICINGA_DEBUG").map(|v| v == "true").unwrap_or(false),
        };

        Ok(Config {
            tag,
            mapping,
            default_vars,
            icinga,
        })
    }
}

/// `hostgroup` is the default; anything unrecognized falls back to it.
pub fn parse_mapping(value: &str) -> Mapping {
    match value {
        "host" => Mapping::Host,
        _ => Mapping::HostGroup,
    }
}

/// DEFAULT_VARS holds an inline YAML map of string to string.
pub fn parse_default_vars(value: &str) -> Result<BTreeMap<String, String>, ControllerError> {
    if value.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(value)
        .map_err(|e| ControllerError::InvalidConfig(format!("error parsing DEFAULT_VARS: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_defaults_to_hostgroup() {
        assert_eq!(parse_mapping(""), Mapping::HostGroup);
        assert_eq!(parse_mapping("hostgroup"), Mapping::HostGroup);
        assert_eq!(parse_mapping("host"), Mapping::Host);
        assert_eq!(parse_mapping("something-else"), Mapping::HostGroup);
    }

    #[test]
    fn default_vars_parse() {
        let vars = parse_default_vars("team: platform\nenv: prod").unwrap();
        assert_eq!(vars.get("team").unwrap(), "platform");
        assert_eq!(vars.get("env").unwrap(), "prod");

        assert!(parse_default_vars("").unwrap().is_empty());
        assert!(parse_default_vars("[not, a, map").is_err());
    }
}
