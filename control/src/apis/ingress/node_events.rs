//! Node event handler for ingress groups
//!
//! Ingress groups route traffic through every traffic-eligible node, so a
//! node becoming eligible or ineligible changes the targets of every group.
//! This handler turns node events into reconcile requests:
//!
//! 1. Classify: only events that can change the eligible node set are relevant
//!    (create/delete of an eligible node, updates that flip eligibility,
//!    and every generic trigger).
//! 2. Resolve: list all ingresses of our class, derive their groups, and
//!    enqueue each distinct group once for this event.
//!
//! Each invocation is self-contained. Duplicate requests across events are
//! coalesced by the queue.

use crate::apis::ingress::class::{matches_ingress_class, ClassFilter};
use crate::apis::ingress::group::{ingress_key, GroupBuilder};
use crate::apis::ingress::lister::IngressLister;
use crate::apis::metrics::{record_enqueue_error, record_enqueue_pass, record_node_event};
use crate::apis::node::eligibility::NodeEligibility;
use crate::apis::node::events::NodeEvent;
use crate::error::RautaError;
use crate::queue::ReconcileQueue;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Receives the errors raised during a resolution pass
pub trait EnqueueReporter: Send + Sync {
    /// Listing failed; the pass was aborted without enqueuing anything
    fn list_failed(&self, error: &RautaError);

    /// The group of one ingress could not be built; that ingress was skipped
    fn group_build_failed(&self, ingress: &str, error: &RautaError);
}

/// Reports through tracing and the controller metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl EnqueueReporter for TracingReporter {
    fn list_failed(&self, error: &RautaError) {
        record_enqueue_error("list_failed");
        error!(error = %error, "failed to list Ingresses");
    }

    fn group_build_failed(&self, ingress: &str, error: &RautaError) {
        record_enqueue_error("group_build_failed");
        error!(ingress = %ingress, error = %error, "failed to build ingress group ID");
    }
}

/// Enqueues the ingress groups impacted by node events
pub struct EnqueueRequestsForNodeEvent {
    ingress_class: String,
    lister: Arc<dyn IngressLister>,
    group_builder: Arc<dyn GroupBuilder>,
    eligibility: Arc<dyn NodeEligibility>,
    class_filter: ClassFilter,
    reporter: Arc<dyn EnqueueReporter>,
}

impl EnqueueRequestsForNodeEvent {
    pub fn new(
        ingress_class: impl Into<String>,
        lister: Arc<dyn IngressLister>,
        group_builder: Arc<dyn GroupBuilder>,
        eligibility: Arc<dyn NodeEligibility>,
    ) -> Self {
        Self {
            ingress_class: ingress_class.into(),
            lister,
            group_builder,
            eligibility,
            class_filter: matches_ingress_class,
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replace the class filter
    pub fn with_class_filter(mut self, class_filter: ClassFilter) -> Self {
        self.class_filter = class_filter;
        self
    }

    /// Replace the error reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn EnqueueReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn ingress_class(&self) -> &str {
        &self.ingress_class
    }

    /// Whether the event can change which nodes proxy traffic
    pub fn is_relevant(&self, event: &NodeEvent) -> bool {
        match event {
            NodeEvent::Create(node) | NodeEvent::Delete(node) => {
                self.eligibility.is_traffic_eligible(node)
            }
            NodeEvent::Update { old, new } => {
                self.eligibility.is_traffic_eligible(old)
                    != self.eligibility.is_traffic_eligible(new)
            }
            NodeEvent::Generic { .. } => true,
        }
    }

    /// Handle one node event, returning the number of groups enqueued
    pub fn handle(&self, event: &NodeEvent, queue: &dyn ReconcileQueue) -> usize {
        let relevant = self.is_relevant(event);
        record_node_event(event.kind(), relevant);

        if !relevant {
            return 0;
        }

        let start = Instant::now();
        let enqueued = self.enqueue_impacted_groups(queue);
        record_enqueue_pass(event.kind(), enqueued, start.elapsed().as_secs_f64());

        enqueued
    }

    /// One full resolution pass over the current ingresses
    ///
    /// Enqueues each distinct group once, in listing order of first
    /// occurrence, and returns how many groups were enqueued.
    pub fn enqueue_impacted_groups(&self, queue: &dyn ReconcileQueue) -> usize {
        let ingresses = match self.lister.list() {
            Ok(ingresses) => ingresses,
            Err(e) => {
                self.reporter.list_failed(&e);
                return 0;
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        for ingress in &ingresses {
            if !(self.class_filter)(&self.ingress_class, ingress) {
                continue;
            }

            let group = match self.group_builder.build_group_id(ingress) {
                Ok(group) => group,
                Err(e) => {
                    self.reporter.group_build_failed(&ingress_key(ingress), &e);
                    continue;
                }
            };

            if seen.insert(group.to_string()) {
                queue.add(group.encode_to_reconcile_request());
            }
        }

        debug!(
            "Enqueued {} ingress group(s) from {} ingress(es)",
            seen.len(),
            ingresses.len()
        );
        seen.len()
    }
}
