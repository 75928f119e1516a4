use anyhow::Result;
use control::apis::ingress::class::matches_ingress_class;
use control::apis::ingress::group::AnnotationGroupBuilder;
use control::apis::ingress::lister::{run_ingress_reflector, StoreLister};
use control::apis::ingress::node_events::EnqueueRequestsForNodeEvent;
use control::apis::node::eligibility::TrafficProxyEligibility;
use control::apis::node::watcher::{run_periodic_resync, watch_nodes};
use control::config::ControllerConfig;
use control::metrics_server::serve_metrics;
use control::queue::{GroupQueue, ReconcileQueue};
use control::worker::{run_worker, GroupMembersReconciler, GroupReconciler};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// RAUTA Control Plane
///
/// Watches Nodes and enqueues the ingress groups whose traffic targets change
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (needed for Kubernetes TLS client)
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok(); // Ignore error if already installed

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("🦀 RAUTA ingress group controller");

    let config = ControllerConfig::from_env()?;
    info!(
        "   IngressClass: {}",
        if config.ingress_class.is_empty() {
            "<default>"
        } else {
            config.ingress_class.as_str()
        }
    );
    info!("   Workers: {}", config.workers);
    info!("   Resync interval: {}s", config.resync_interval_secs);

    let client = kube::Client::try_default().await?;

    let mut handles = vec![];

    // Ingress cache
    let (store, writer) = reflector::store::<Ingress>();
    let synced = Arc::new(AtomicBool::new(false));
    handles.push(tokio::spawn(run_ingress_reflector(
        client.clone(),
        writer,
        synced.clone(),
    )));
    let lister = Arc::new(StoreLister::new(store, synced));

    let queue = Arc::new(GroupQueue::new(&config.queue));
    let group_builder = Arc::new(AnnotationGroupBuilder);

    let handler = Arc::new(EnqueueRequestsForNodeEvent::new(
        config.ingress_class.clone(),
        lister.clone(),
        group_builder.clone(),
        Arc::new(TrafficProxyEligibility),
    ));

    // Node watcher and periodic resync, once the ingress cache can be listed
    let sink: Arc<dyn ReconcileQueue> = queue.clone();
    let resync_interval = Duration::from_secs(config.resync_interval_secs);
    let cache = lister.clone();
    let node_client = client.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = cache.wait_until_synced().await {
            error!("Ingress cache never synced, node events disabled: {}", e);
            return;
        }
        info!("Ingress cache synced, starting node event handling");

        tokio::join!(
            watch_nodes(node_client, handler.clone(), sink.clone()),
            run_periodic_resync(handler, sink, resync_interval),
        );
    }));

    // Workers
    let reconciler: Arc<dyn GroupReconciler> = Arc::new(GroupMembersReconciler::new(
        config.ingress_class.clone(),
        lister,
        matches_ingress_class,
        group_builder,
    ));
    let mut workers = vec![];
    for id in 0..config.workers {
        workers.push(tokio::spawn(run_worker(
            id,
            queue.clone(),
            reconciler.clone(),
        )));
    }

    // Metrics
    let metrics_addr = config.metrics_addr.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = serve_metrics(metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    }));

    info!("✅ Controller started");
    info!("Press Ctrl-C to exit.");

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Stop intake first, then let workers finish what they hold
    for handle in handles {
        handle.abort();
    }
    queue.shut_down();
    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}
