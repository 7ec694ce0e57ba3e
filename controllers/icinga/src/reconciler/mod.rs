//! Reconcilers
//!
//! Per-kind handlers for watched cluster objects (`workload`) and the
//! projection of DSRs into the Icinga backend (`projector`), plus the
//! shared vars plumbing.

pub mod projector;
pub mod workload;


use std::collections::BTreeMap;

use icinga_client::Vars;
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;
use tracing::error;

use crate::config::{annotations, vars};
use crate::controller::Controller;

/// Merge string maps; later maps win on key collisions.
pub(crate) fn merge_vars(maps: &[&BTreeMap<String, String>]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for map in maps {
        for (k, v) in map.iter() {
            merged.insert(k.clone(), v.clone());
        }
    }
    merged
}

/// True when a backend object's variables differ from the desired set.
///
/// Desired variables are always strings; a non-string value that slipped
/// into the backend out-of-band compares unequal and forces an update.
pub(crate) fn vars_differ(observed: &Vars, desired: &Vars) -> bool {
    observed != desired
}

impl Controller {
    /// The classification header for a monitored cluster object, overlaid
    /// on the configured default vars.
    pub(crate) fn make_vars<K: ResourceExt>(
        &self,
        o: &K,
        type_label: &str,
        namespaced: bool,
    ) -> BTreeMap<String, String> {
        let nsvar = if namespaced {
            o.namespace().unwrap_or_default()
        } else {
            String::new()
        };

        let mut header = BTreeMap::new();
        header.insert(vars::NAME.to_string(), o.name_any());
        header.insert(vars::TYPE.to_string(), type_label.to_string());
        header.insert(vars::CLUSTER.to_string(), self.tag.clone());
        header.insert(vars::NAMESPACE.to_string(), nsvar);

        merge_vars(&[&self.default_vars, &header])
    }

    /// True if this object should be monitored.
    ///
    /// Checked in order: the disable annotation, owner references (the
    /// object is controlled by something else that we monitor instead), a
    /// pending deletion, and the disable annotation on the enclosing
    /// namespace. A namespace missing from the cache counts as not
    /// monitored; a transient lookup problem must not delete backend state.
    pub(crate) fn monitored<K: ResourceExt>(&self, o: &K) -> bool {
        if has_disable_annotation(o.annotations()) {
            return false;
        }

        if !o.owner_references().is_empty() {
            return false;
        }

        if o.meta().deletion_timestamp.is_some() {
            return false;
        }

        if let Some(ns) = o.namespace() {
            match self.stores.namespaces.get(&ObjectRef::new(&ns)) {
                Some(namespace) => {
                    if has_disable_annotation(namespace.annotations()) {
                        return false;
                    }
                }
                None => {
                    error!("error getting namespace '{ns}': not in cache");
                    return false;
                }
            }
        }

        true
    }
}

fn has_disable_annotation(object_annotations: &BTreeMap<String, String>) -> bool {
    object_annotations
        .get(annotations::DISABLE_MONITORING)
        .is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn string_vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn later_maps_win() {
        let defaults = map(&[("env", "prod"), ("team", "platform")]);
        let specific = map(&[("env", "dev")]);
        let merged = merge_vars(&[&defaults, &specific]);

        assert_eq!(merged.get("env").unwrap(), "dev");
        assert_eq!(merged.get("team").unwrap(), "platform");
    }

    #[test]
    fn equal_string_vars_do_not_differ() {
        let a = string_vars(&[("env", "prod"), ("team", "platform")]);
        let b = string_vars(&[("team", "platform"), ("env", "prod")]);
        assert!(!vars_differ(&a, &b));
    }

    #[test]
    fn changed_or_missing_keys_differ() {
        let desired = string_vars(&[("env", "prod")]);
        assert!(vars_differ(&string_vars(&[("env", "dev")]), &desired));
        assert!(vars_differ(&Vars::new(), &desired));
        assert!(vars_differ(
            &string_vars(&[("env", "prod"), ("extra", "x")]),
            &desired
        ));
    }

    #[test]
    fn non_string_value_forces_update() {
        // Someone edited the backend object by hand and left a boolean.
        let mut observed = Vars::new();
        observed.insert("env".to_string(), serde_json::Value::Bool(true));
        let desired = string_vars(&[("env", "true")]);
        assert!(vars_differ(&observed, &desired));
    }

    #[test]
    fn empty_disable_annotation_does_not_disable() {
        assert!(!has_disable_annotation(&map(&[(
            annotations::DISABLE_MONITORING,
            ""
        )])));
        assert!(has_disable_annotation(&map(&[(
            annotations::DISABLE_MONITORING,
            "true"
        )])));
        assert!(has_disable_annotation(&map(&[(
            annotations::DISABLE_MONITORING,
            "anything"
        )])));
    }
}
