use common::GroupNameError;
use thiserror::Error;

/// RAUTA Control Plane Errors
#[derive(Error, Debug)]
pub enum RautaError {
    #[error("{kind} cache has not completed its initial sync")]
    CacheNotSynced { kind: &'static str },

    #[error("failed to list {kind}: {reason}")]
    ListFailed { kind: &'static str, reason: String },

    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },

    #[error("invalid group name: {0}")]
    InvalidGroupName(#[from] GroupNameError),

    #[error("invalid group order '{value}' on {ingress}: must be an integer in [{min}, {max}]")]
    InvalidGroupOrder {
        ingress: String,
        value: String,
        min: i32,
        max: i32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
