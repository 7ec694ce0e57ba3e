//! Kubernetes resource watch loops.
//!
//! One loop per watched kind. Each loop feeds a reflector store (the
//! local cache the workers read from) and translates watch events into
//! queue traffic: applies enqueue the object key, deletes run the per-kind
//! deleted handler synchronously with the final object carried by the
//! event. Deletes cannot go through the queue, the object is no longer
//! readable from the cache by the time a worker would pick the key up.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::reflector::store::Writer;
use kube_runtime::{watcher, WatchStreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::controller::Controller;
use crate::error::ControllerError;
use crate::workqueue::WorkQueue;

/// Synchronous deletion callback, invoked with the tombstone object.
pub(crate) type DeleteHandler<K> = Box<
    dyn Fn(Arc<Controller>, K) -> BoxFuture<'static, Result<(), ControllerError>> + Send + Sync,
>;

pub(crate) fn delete_handler<K, F, Fut>(f: F) -> DeleteHandler<K>
where
    F: Fn(Arc<Controller>, K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
{
    Box::new(move |controller, object| Box::pin(f(controller, object)))
}

/// `<namespace>/<name>` for namespaced objects, `<name>` otherwise.
pub(crate) fn object_key<K: ResourceExt>(o: &K) -> String {
    match o.namespace() {
        Some(ns) => format!("{}/{}", ns, o.name_any()),
        None => o.name_any(),
    }
}

pub(crate) fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, key),
    }
}

/// Watch one kind until shutdown, keeping its store fresh and its queue
/// fed. Stream errors are logged; the watcher re-establishes itself with
/// backoff.
pub(crate) fn spawn_watch<K>(
    controller: Arc<Controller>,
    api: Api<K>,
    writer: Writer<K>,
    queue: Arc<WorkQueue>,
    kind: &'static str,
    on_delete: Option<DeleteHandler<K>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: Resource + Clone + Debug + Send + Sync + serde::de::DeserializeOwned + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    tokio::spawn(async move {
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer);
        let mut stream = Box::pin(stream);

        info!("starting {kind} watcher");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("stopping {kind} watcher");
                    return;
                }
                event = stream.next() => match event {
                    None => {
                        warn!("{kind} watch stream ended");
                        return;
                    }
                    Some(Ok(watcher::Event::Apply(o) | watcher::Event::InitApply(o))) => {
                        queue.add(object_key(&o));
                    }
                    Some(Ok(watcher::Event::Delete(o))) => {
                        if let Some(handler) = &on_delete {
                            if let Err(e) = handler(controller.clone(), o).await {
                                error!("failed to process {kind} deletion: {e}");
                            }
                        }
                    }
                    Some(Ok(watcher::Event::Init)) => {
                        debug!("{kind} watch: relist started");
                    }
                    Some(Ok(watcher::Event::InitDone)) => {
                        debug!("{kind} watch: cache primed");
                    }
                    Some(Err(e)) => {
                        warn!("{kind} watch stream error: {e}");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        assert_eq!(split_key("default/po-standalone"), (Some("default"), "po-standalone"));
        assert_eq!(split_key("node1"), (None, "node1"));
    }
}
