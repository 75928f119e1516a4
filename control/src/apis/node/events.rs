//! Node lifecycle events
//!
//! kube-rs watchers only deliver the latest state of an object. Eligibility
//! flips can only be detected against the previous state, so
//! [`NodeEventTracker`] keeps the last seen snapshot of each node and turns
//! watcher events into Create/Update/Delete events carrying both snapshots.

use k8s_openapi::api::core::v1::Node;
use kube::runtime::watcher;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Node event delivered to the node event handlers
#[derive(Debug, Clone)]
pub enum NodeEvent {
    Create(Arc<Node>),
    Update { old: Arc<Node>, new: Arc<Node> },
    Delete(Arc<Node>),
    /// Synthetic trigger (periodic resync, external request); carries no node
    Generic { source: String },
}

impl NodeEvent {
    pub fn generic(source: impl Into<String>) -> Self {
        NodeEvent::Generic {
            source: source.into(),
        }
    }

    /// Event kind used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::Create(_) => "create",
            NodeEvent::Update { .. } => "update",
            NodeEvent::Delete(_) => "delete",
            NodeEvent::Generic { .. } => "generic",
        }
    }

    /// Name of the node involved, if any
    pub fn node_name(&self) -> Option<String> {
        match self {
            NodeEvent::Create(node) | NodeEvent::Delete(node) => Some(node.name_any()),
            NodeEvent::Update { new, .. } => Some(new.name_any()),
            NodeEvent::Generic { .. } => None,
        }
    }
}

/// Converts watcher events into node lifecycle events
#[derive(Debug, Default)]
pub struct NodeEventTracker {
    /// Last seen snapshot per node name
    known: HashMap<String, Arc<Node>>,
    /// Nodes seen since the current relist started
    relisting: Option<HashSet<String>>,
}

impl NodeEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Feed one watcher event, returning the node events it implies
    pub fn observe(&mut self, event: watcher::Event<Node>) -> Vec<NodeEvent> {
        match event {
            watcher::Event::Init => {
                debug!("Node relist started ({} known)", self.known.len());
                self.relisting = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(node) => {
                if let Some(seen) = self.relisting.as_mut() {
                    seen.insert(node.name_any());
                }
                self.apply(node).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let seen = self.relisting.take().unwrap_or_default();
                let vanished: Vec<String> = self
                    .known
                    .keys()
                    .filter(|name| !seen.contains(*name))
                    .cloned()
                    .collect();

                debug!(
                    "Node relist complete: {} seen, {} vanished",
                    seen.len(),
                    vanished.len()
                );

                vanished
                    .into_iter()
                    .filter_map(|name| self.known.remove(&name))
                    .map(NodeEvent::Delete)
                    .collect()
            }
            watcher::Event::Apply(node) => self.apply(node).into_iter().collect(),
            watcher::Event::Delete(node) => {
                let name = node.name_any();
                self.known.remove(&name);
                if let Some(seen) = self.relisting.as_mut() {
                    seen.remove(&name);
                }
                vec![NodeEvent::Delete(Arc::new(node))]
            }
        }
    }

    fn apply(&mut self, node: Node) -> Option<NodeEvent> {
        let new = Arc::new(node);
        match self.known.insert(new.name_any(), new.clone()) {
            None => Some(NodeEvent::Create(new)),
            Some(old) => {
                let unchanged = old.resource_version().is_some()
                    && old.resource_version() == new.resource_version();
                if unchanged {
                    None
                } else {
                    Some(NodeEvent::Update { old, new })
                }
            }
        }
    }
}
