//! Unit tests for the housekeeper sweeps.
//!
//! The backend mock is seeded with owned, foreign and malformed objects;
//! the in-memory DSR store decides which owners still exist.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crds::{CheckSpec, HostGroupSpec, HostSpec};
    use icinga_client as icinga;
    use icinga_client::IcingaClientTrait;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use crate::config::vars;
    use crate::mapping::Mapping;
    use crate::test_utils::*;

    fn icinga_vars(pairs: &[(&str, &str)]) -> icinga::Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn owned_group(name: &str, owner: &str) -> icinga::HostGroup {
        icinga::HostGroup {
            name: name.to_string(),
            vars: icinga_vars(&[(vars::CLUSTER, "testing"), (vars::OWNER, owner)]),
        }
    }

    fn hostgroup_record(ns: &str, name: &str) -> crds::HostGroup {
        crds::HostGroup {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..ObjectMeta::default()
            },
            spec: HostGroupSpec {
                name: name.to_string(),
                vars: BTreeMap::new(),
            },
        }
    }

    #[tokio::test]
    async fn orphaned_hostgroup_is_deleted() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga
            .add_host_group(owned_group("testing.gone", "kube-system/gone"));
        ctx.icinga
            .add_host_group(owned_group("testing.kept", "kube-system/kept"));
        ctx.dsr.insert_host_group(hostgroup_record("kube-system", "kept"));

        ctx.controller.host_group_housekeeping().await;

        assert!(ctx
            .icinga
            .get_host_group("testing.gone")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(ctx.icinga.get_host_group("testing.kept").await.is_ok());
    }

    #[tokio::test]
    async fn foreign_objects_are_skipped() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga.add_host_group(icinga::HostGroup {
            name: "someone-elses".to_string(),
            vars: icinga_vars(&[(vars::CLUSTER, "someone"), (vars::OWNER, "ns/gone")]),
        });
        ctx.icinga.add_host_group(icinga::HostGroup {
            name: "untagged".to_string(),
            vars: icinga::Vars::new(),
        });

        ctx.controller.host_group_housekeeping().await;

        assert!(ctx.icinga.get_host_group("someone-elses").await.is_ok());
        assert!(ctx.icinga.get_host_group("untagged").await.is_ok());
        assert_eq!(ctx.icinga.write_counts().deletes, 0);
    }

    #[tokio::test]
    async fn owned_but_unowned_objects_are_kept() {
        let ctx = test_controller(Mapping::HostGroup);

        // Ours, but without an owner var. Possibly from an older schema;
        // never delete on missing evidence.
        ctx.icinga.add_host_group(icinga::HostGroup {
            name: "testing.legacy".to_string(),
            vars: icinga_vars(&[(vars::CLUSTER, "testing")]),
        });

        ctx.controller.host_group_housekeeping().await;

        assert!(ctx.icinga.get_host_group("testing.legacy").await.is_ok());
    }

    #[tokio::test]
    async fn unparsable_owner_is_kept() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga
            .add_host_group(owned_group("testing.odd", "not-a-key"));
        ctx.icinga
            .add_host_group(owned_group("testing.odder", "a/b/c"));

        ctx.controller.host_group_housekeeping().await;

        assert!(ctx.icinga.get_host_group("testing.odd").await.is_ok());
        assert!(ctx.icinga.get_host_group("testing.odder").await.is_ok());
    }

    #[tokio::test]
    async fn lookup_errors_keep_the_object() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga
            .add_host_group(owned_group("testing.flaky", "kube-system/flaky"));
        ctx.dsr.set_fail_gets(true);

        ctx.controller.host_group_housekeeping().await;

        assert!(ctx.icinga.get_host_group("testing.flaky").await.is_ok());
    }

    #[tokio::test]
    async fn orphaned_host_is_deleted() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga.add_host(icinga::Host {
            name: "testing.default.po-gone".to_string(),
            vars: icinga_vars(&[(vars::CLUSTER, "testing"), (vars::OWNER, "default/po-gone")]),
            ..icinga::Host::default()
        });

        ctx.controller.host_housekeeping().await;

        assert!(ctx
            .icinga
            .get_host("testing.default.po-gone")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn orphaned_service_is_deleted_by_full_name() {
        let ctx = test_controller(Mapping::HostGroup);

        ctx.icinga.add_service(icinga::Service {
            name: "http-check".to_string(),
            host_name: "testing.myhost".to_string(),
            vars: icinga_vars(&[(vars::CLUSTER, "testing"), (vars::OWNER, "default/http-check")]),
            ..icinga::Service::default()
        });

        ctx.controller.check_housekeeping().await;

        assert!(ctx
            .icinga
            .get_service("testing.myhost!http-check")
            .await
            .unwrap_err()
            .is_not_found());
    }

    /// User-authored DSRs appear in the backend, then disappear within one
    /// housekeeper pass after the records are deleted.
    #[tokio::test]
    async fn deleted_custom_records_converge_to_empty_backend() {
        let ctx = test_controller(Mapping::HostGroup);

        let group = hostgroup_record("default", "myhostgroup");
        let host = crds::Host {
            metadata: ObjectMeta {
                name: Some("myhost".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            spec: HostSpec {
                name: "myhost".to_string(),
                hostgroups: vec!["myhostgroup".to_string()],
                vars: [("myanothervar".to_string(), "nicevar".to_string())]
                    .into_iter()
                    .collect(),
                ..HostSpec::default()
            },
        };
        let check = crds::Check {
            metadata: ObjectMeta {
                name: Some("http-check".to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            spec: CheckSpec {
                name: "http-check".to_string(),
                host: "myhost".to_string(),
                check_command: "check_http".to_string(),
                ..CheckSpec::default()
            },
        };

        ctx.dsr.insert_host_group(group.clone());
        ctx.dsr.insert_host(host.clone());
        ctx.dsr.insert_check(check.clone());

        ctx.controller.host_group_created_or_updated(&group).await.unwrap();
        ctx.controller.host_created_or_updated(&host).await.unwrap();
        ctx.controller.check_created_or_updated(&check).await.unwrap();

        assert!(ctx.icinga.get_host_group("testing.myhostgroup").await.is_ok());
        assert!(ctx.icinga.get_host("testing.myhost").await.is_ok());
        assert!(ctx
            .icinga
            .get_service("testing.myhost!http-check")
            .await
            .is_ok());

        // The user deletes all three records.
        ctx.dsr.remove_host_group("default", "myhostgroup");
        ctx.dsr.remove_host("default", "myhost");
        ctx.dsr.remove_check("default", "http-check");

        ctx.controller.host_group_housekeeping().await;
        ctx.controller.host_housekeeping().await;
        ctx.controller.check_housekeeping().await;

        assert!(ctx.icinga.list_host_groups().await.unwrap().is_empty());
        assert!(ctx.icinga.list_hosts().await.unwrap().is_empty());
        assert!(ctx.icinga.list_services().await.unwrap().is_empty());
    }
}
