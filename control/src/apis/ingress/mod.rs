//! Ingress support
//!
//! - Class: which ingresses this controller serves
//! - Group: how ingresses are grouped into reconcile units
//! - Lister: cached ingress listing
//! - Node events: node lifecycle -> impacted ingress groups

pub mod class;
pub mod group;
pub mod lister;
pub mod node_events;
