//! Traffic eligibility of nodes
//!
//! A node is eligible when it may receive proxied application traffic:
//! it is Ready and carries none of the exclusion labels.

use k8s_openapi::api::core::v1::Node;

pub const LABEL_NODE_ROLE_MASTER: &str = "node-role.kubernetes.io/master";
pub const LABEL_NODE_ROLE_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";
pub const LABEL_ALPHA_EXCLUDE_BALANCER: &str =
    "alpha.service-controller.kubernetes.io/exclude-balancer";
pub const LABEL_EXCLUDE_FROM_EXTERNAL_LB: &str =
    "node.kubernetes.io/exclude-from-external-load-balancers";
pub const LABEL_EKS_COMPUTE_TYPE: &str = "eks.amazonaws.com/compute-type";

const EXCLUSION_LABELS: [&str; 4] = [
    LABEL_NODE_ROLE_MASTER,
    LABEL_NODE_ROLE_CONTROL_PLANE,
    LABEL_ALPHA_EXCLUDE_BALANCER,
    LABEL_EXCLUDE_FROM_EXTERNAL_LB,
];

/// Decides whether a node may receive proxied traffic
pub trait NodeEligibility: Send + Sync {
    fn is_traffic_eligible(&self, node: &Node) -> bool;
}

impl<F> NodeEligibility for F
where
    F: Fn(&Node) -> bool + Send + Sync,
{
    fn is_traffic_eligible(&self, node: &Node) -> bool {
        self(node)
    }
}

/// Label and readiness based eligibility
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficProxyEligibility;

impl NodeEligibility for TrafficProxyEligibility {
    fn is_traffic_eligible(&self, node: &Node) -> bool {
        if let Some(labels) = &node.metadata.labels {
            if EXCLUSION_LABELS.iter().any(|label| labels.contains_key(*label)) {
                return false;
            }
            if labels.get(LABEL_EKS_COMPUTE_TYPE).map(String::as_str) == Some("fargate") {
                return false;
            }
        }

        is_node_ready(node)
    }
}

/// Whether the node reports a `Ready` condition with status `True`
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|ready| ready.status == "True")
        .unwrap_or(false)
}
