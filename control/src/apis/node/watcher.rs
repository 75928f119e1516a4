//! Node watcher
//!
//! Watches Node resources cluster-wide and hands lifecycle events to the
//! ingress group node event handler.

use crate::apis::ingress::node_events::EnqueueRequestsForNodeEvent;
use crate::apis::node::events::{NodeEvent, NodeEventTracker};
use crate::queue::ReconcileQueue;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{api::Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Watch Nodes and enqueue impacted ingress groups
///
/// This function runs indefinitely. Call it in a tokio::spawn() task.
pub async fn watch_nodes(
    client: Client,
    handler: Arc<EnqueueRequestsForNodeEvent>,
    queue: Arc<dyn ReconcileQueue>,
) {
    let api: Api<Node> = Api::all(client);
    let watcher = watcher(api, WatcherConfig::default()).default_backoff();

    futures::pin_mut!(watcher);

    info!("Starting Node watcher");

    let mut tracker = NodeEventTracker::new();

    while let Some(event) = watcher.next().await {
        match event {
            Ok(event) => {
                let init_done = matches!(event, watcher::Event::InitDone);
                for node_event in tracker.observe(event) {
                    dispatch(&handler, &node_event, queue.as_ref());
                }
                if init_done {
                    info!("Node watcher sync complete ({} nodes)", tracker.len());
                }
            }
            Err(e) => {
                warn!("Node watcher error: {}", e);
            }
        }
    }
}

fn dispatch(
    handler: &EnqueueRequestsForNodeEvent,
    event: &NodeEvent,
    queue: &dyn ReconcileQueue,
) {
    let enqueued = handler.handle(event, queue);
    debug!(
        event = event.kind(),
        node = event.node_name().as_deref().unwrap_or("-"),
        enqueued,
        "Node event handled"
    );
}

/// Inject a Generic event now and then every `interval`
///
/// The immediate pass covers node events handled before this task started.
/// Later passes recover from listing failures and missed events without
/// waiting for node activity. Start it once the ingress cache has synced.
/// Runs indefinitely.
pub async fn run_periodic_resync(
    handler: Arc<EnqueueRequestsForNodeEvent>,
    queue: Arc<dyn ReconcileQueue>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Starting periodic resync every {:?}", interval);

    loop {
        ticker.tick().await;
        dispatch(&handler, &NodeEvent::generic("resync"), queue.as_ref());
    }
}
