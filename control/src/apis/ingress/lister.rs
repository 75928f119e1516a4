//! Ingress listing from the local reflector cache
//!
//! Impact resolution reads ingresses from an in-memory cache kept current by
//! a reflector, never from the API server. Until the reflector finishes its
//! initial listing the cache is partial, and listing fails instead of
//! returning an incomplete view.

use crate::error::RautaError;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::{self, store::Writer, Store};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{api::Api, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lists every ingress currently known
pub trait IngressLister: Send + Sync {
    fn list(&self) -> Result<Vec<Arc<Ingress>>, RautaError>;
}

/// Reflector-backed lister
#[derive(Clone)]
pub struct StoreLister {
    store: Store<Ingress>,
    synced: Arc<AtomicBool>,
}

impl StoreLister {
    /// Create a lister over `store`; `synced` is raised by [`run_ingress_reflector`]
    pub fn new(store: Store<Ingress>, synced: Arc<AtomicBool>) -> Self {
        Self { store, synced }
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Wait until the reflector has applied its initial listing
    ///
    /// Fails with `ListFailed` if the reflector's writer is dropped first.
    pub async fn wait_until_synced(&self) -> Result<(), RautaError> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|e| RautaError::ListFailed {
                kind: "Ingress",
                reason: e.to_string(),
            })?;
        // The store turns ready on the same InitDone the reflector loop reacts to
        self.synced.store(true, Ordering::Release);
        Ok(())
    }
}

impl IngressLister for StoreLister {
    fn list(&self) -> Result<Vec<Arc<Ingress>>, RautaError> {
        if !self.is_synced() {
            return Err(RautaError::CacheNotSynced { kind: "Ingress" });
        }
        Ok(self.store.state())
    }
}

/// Keep `writer` in sync with all Ingresses across namespaces
///
/// Raises `synced` once the initial listing has landed in the store.
/// Runs indefinitely. Call it in a tokio::spawn() task.
pub async fn run_ingress_reflector(
    client: Client,
    writer: Writer<Ingress>,
    synced: Arc<AtomicBool>,
) {
    let api: Api<Ingress> = Api::all(client);
    let stream = reflector::reflector(writer, watcher(api, WatcherConfig::default()))
        .default_backoff();

    futures::pin_mut!(stream);

    info!("Starting Ingress reflector");

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::InitDone) => {
                if !synced.swap(true, Ordering::AcqRel) {
                    info!("Ingress cache initial sync complete");
                }
            }
            Ok(watcher::Event::Init) => {
                debug!("Ingress reflector relisting");
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Ingress reflector error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn ingress(namespace: &str, name: &str) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_unsynced_store_refuses_to_list() {
        let (store, _writer) = reflector::store::<Ingress>();
        let lister = StoreLister::new(store, Arc::new(AtomicBool::new(false)));

        let result = lister.list();
        assert!(matches!(
            result,
            Err(RautaError::CacheNotSynced { kind: "Ingress" })
        ));
    }

    #[test]
    fn test_synced_store_lists_cached_ingresses() {
        let (store, mut writer) = reflector::store::<Ingress>();
        writer.apply_watcher_event(&watcher::Event::Apply(ingress("default", "web")));
        writer.apply_watcher_event(&watcher::Event::Apply(ingress("prod", "api")));

        let lister = StoreLister::new(store, Arc::new(AtomicBool::new(true)));
        let mut names: Vec<String> = lister
            .list()
            .expect("Should list")
            .iter()
            .map(|ing| ing.metadata.name.clone().unwrap_or_default())
            .collect();
        names.sort();

        assert_eq!(names, vec!["api".to_string(), "web".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_until_synced_unblocks_listing_after_init_done() {
        let (store, mut writer) = reflector::store::<Ingress>();
        let lister = StoreLister::new(store, Arc::new(AtomicBool::new(false)));

        writer.apply_watcher_event(&watcher::Event::Init);
        writer.apply_watcher_event(&watcher::Event::InitApply(ingress("default", "web")));
        assert!(lister.list().is_err(), "Partial relist must not be listed");

        writer.apply_watcher_event(&watcher::Event::InitDone);
        tokio::time::timeout(std::time::Duration::from_secs(1), lister.wait_until_synced())
            .await
            .expect("Should resolve once InitDone is applied")
            .expect("Writer is alive");

        assert!(lister.is_synced());
        assert_eq!(lister.list().expect("Should list").len(), 1);
    }

    #[tokio::test]
    async fn test_wait_until_synced_fails_when_reflector_is_gone() {
        let (store, writer) = reflector::store::<Ingress>();
        let lister = StoreLister::new(store, Arc::new(AtomicBool::new(false)));
        drop(writer);

        let result = lister.wait_until_synced().await;
        assert!(matches!(
            result,
            Err(RautaError::ListFailed { kind: "Ingress", .. })
        ));
        assert!(!lister.is_synced());
    }
}
