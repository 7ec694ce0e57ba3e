//! Cluster event publication.
//!
//! Reconciliation outcomes are surfaced as core v1 Events on the owning
//! DSR: `Normal` with a short message for successful writes, `Warning`
//! carrying the backend error text for failures. Publication is
//! best-effort; a failed event write is logged and otherwise ignored.

use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::chrono::Utc;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::warn;

/// API version reported for the involved DSR objects
const DSR_API_VERSION: &str = "icinga.monitoring.io/v1";

#[derive(Clone)]
pub struct Recorder {
    client: Option<Client>,
}

impl Recorder {
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// A recorder that drops every event. Used by tests, which have no
    /// cluster to write to.
    #[allow(dead_code)]
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Attach an event to the given DSR.
    pub async fn publish<K: ResourceExt>(&self, o: &K, kind: &str, message: &str, warning: bool) {
        let Some(client) = &self.client else {
            return;
        };

        let namespace = o.namespace().unwrap_or_default();
        let now = Time(Utc::now());

        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-", o.name_any())),
                namespace: Some(namespace.clone()),
                ..ObjectMeta::default()
            },
            involved_object: ObjectReference {
                api_version: Some(DSR_API_VERSION.to_string()),
                kind: Some(kind.to_string()),
                name: Some(o.name_any()),
                namespace: Some(namespace.clone()),
                uid: o.uid(),
                resource_version: o.resource_version(),
                ..ObjectReference::default()
            },
            message: Some(message.to_string()),
            type_: Some(if warning { "Warning" } else { "Normal" }.to_string()),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            ..Event::default()
        };

        let api: Api<Event> = Api::namespaced(client.clone(), &namespace);
        if let Err(e) = api.create(&PostParams::default(), &event).await {
            warn!(
                "failed to publish event for {kind} '{}/{}': {e}",
                namespace,
                o.name_any()
            );
        }
    }
}
