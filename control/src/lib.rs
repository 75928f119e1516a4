//! RAUTA Control Plane Library
//!
//! Exposes the node event handler, ingress grouping, reconcile queue and
//! workers for the binary and integration tests

pub mod apis;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod queue;
pub mod worker;
