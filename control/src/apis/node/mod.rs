//! Node lifecycle support
//!
//! - Eligibility: whether a node may receive proxied traffic
//! - Events: Create/Update/Delete/Generic node events with before/after snapshots
//! - Watcher: cluster-wide Node watch and periodic resync feeding the handlers

pub mod eligibility;
pub mod events;
pub mod watcher;
