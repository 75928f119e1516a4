//! Kubernetes API integrations
//!
//! This module contains watchers and handlers for Nodes and Ingresses (networking.k8s.io/v1).

pub mod ingress;
pub mod metrics;
pub mod node;
