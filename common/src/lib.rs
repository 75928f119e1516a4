//! RAUTA Common Types
//!
//! Ingress group identity shared by the node event handlers (producers) and
//! the group reconcilers (consumers). A [`GroupId`] is encoded into a
//! [`ReconcileRequest`] before it is queued, and decoded back on the other
//! side. The encoding is lossless in both directions.

use std::fmt;
use thiserror::Error;

/// Maximum length of an explicit group name
pub const MAX_GROUP_NAME_LEN: usize = 63;

/// Errors raised while validating an explicit group name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupNameError {
    #[error("group name cannot be empty")]
    Empty,

    #[error("group name '{0}' exceeds {MAX_GROUP_NAME_LEN} characters")]
    TooLong(String),

    #[error("group name '{name}' contains invalid character '{invalid}' (must be lowercase alphanumeric, '-' or '.')")]
    InvalidCharacter { name: String, invalid: char },

    #[error("group name '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("group name segment '{segment}' in '{name}' must start and end with an alphanumeric character")]
    InvalidSegmentBoundary { name: String, segment: String },
}

/// Validate an explicit group name
///
/// Rules:
/// - 1 to 63 characters
/// - Dot-separated segments of lowercase alphanumerics and '-'
/// - Each segment starts and ends with an alphanumeric character
pub fn validate_group_name(name: &str) -> Result<(), GroupNameError> {
    if name.is_empty() {
        return Err(GroupNameError::Empty);
    }

    if name.len() > MAX_GROUP_NAME_LEN {
        return Err(GroupNameError::TooLong(name.to_string()));
    }

    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(GroupNameError::EmptySegment(name.to_string()));
        }

        if let Some(invalid) = segment
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
        {
            return Err(GroupNameError::InvalidCharacter {
                name: name.to_string(),
                invalid,
            });
        }

        if segment.starts_with('-') || segment.ends_with('-') {
            return Err(GroupNameError::InvalidSegmentBoundary {
                name: name.to_string(),
                segment: segment.to_string(),
            });
        }
    }

    Ok(())
}

/// Identity of a set of ingresses reconciled together
///
/// Two ingresses that must be reconciled as a unit always produce equal
/// identifiers. Ordering and hashing follow the variant and its fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum GroupId {
    /// Group named through an annotation, shared by every ingress that names it
    Explicit { name: String },
    /// Group of exactly one ingress, identified by its namespaced name
    Implicit { namespace: String, name: String },
}

impl GroupId {
    /// Build an explicit group, validating its name
    pub fn explicit(name: impl Into<String>) -> Result<Self, GroupNameError> {
        let name = name.into();
        validate_group_name(&name)?;
        Ok(GroupId::Explicit { name })
    }

    /// Build the implicit group of a single ingress
    pub fn implicit(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        GroupId::Implicit {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, GroupId::Explicit { .. })
    }

    /// Encode into the request submitted to the reconcile queue
    pub fn encode_to_reconcile_request(&self) -> ReconcileRequest {
        match self {
            GroupId::Explicit { name } => ReconcileRequest {
                namespace: None,
                name: name.clone(),
            },
            GroupId::Implicit { namespace, name } => ReconcileRequest {
                namespace: Some(namespace.clone()),
                name: name.clone(),
            },
        }
    }

    /// Recover the group from a dequeued request
    ///
    /// A request without a namespace (or with an empty one) names an explicit group.
    pub fn decode_from_reconcile_request(request: &ReconcileRequest) -> Self {
        match request.namespace.as_deref() {
            None | Some("") => GroupId::Explicit {
                name: request.name.clone(),
            },
            Some(namespace) => GroupId::Implicit {
                namespace: namespace.to_string(),
                name: request.name.clone(),
            },
        }
    }
}

/// Canonical string form: `name` for explicit groups, `namespace/name` for implicit ones
impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Explicit { name } => write!(f, "{}", name),
            GroupId::Implicit { namespace, name } => write!(f, "{}/{}", namespace, name),
        }
    }
}

/// Unit of work submitted to the reconcile queue, one per distinct group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconcileRequest {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub namespace: Option<String>,
    pub name: String,
}

impl From<&GroupId> for ReconcileRequest {
    fn from(group: &GroupId) -> Self {
        group.encode_to_reconcile_request()
    }
}

impl From<&ReconcileRequest> for GroupId {
    fn from(request: &ReconcileRequest) -> Self {
        GroupId::decode_from_reconcile_request(request)
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_group_name_accepts_dns_like_names() {
        for name in ["g1", "team-a", "shared.edge", "a", "0-public.v2"] {
            assert!(validate_group_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_validate_group_name_rejections() {
        assert_eq!(validate_group_name(""), Err(GroupNameError::Empty));
        assert!(matches!(
            validate_group_name(&"a".repeat(64)),
            Err(GroupNameError::TooLong(_))
        ));
        assert!(matches!(
            validate_group_name("Team"),
            Err(GroupNameError::InvalidCharacter { invalid: 'T', .. })
        ));
        assert!(matches!(
            validate_group_name("ns/name"),
            Err(GroupNameError::InvalidCharacter { invalid: '/', .. })
        ));
        assert!(matches!(
            validate_group_name("a..b"),
            Err(GroupNameError::EmptySegment(_))
        ));
        assert!(matches!(
            validate_group_name("-edge"),
            Err(GroupNameError::InvalidSegmentBoundary { .. })
        ));
        assert!(matches!(
            validate_group_name("edge.-x"),
            Err(GroupNameError::InvalidSegmentBoundary { .. })
        ));
    }

    #[test]
    fn test_max_length_name_is_valid() {
        assert!(validate_group_name(&"a".repeat(MAX_GROUP_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_display_canonical_forms() {
        assert_eq!(GroupId::explicit("g1").unwrap().to_string(), "g1");
        assert_eq!(GroupId::implicit("default", "web").to_string(), "default/web");
    }

    #[test]
    fn test_explicit_encodes_without_namespace() {
        let request = GroupId::explicit("shared").unwrap().encode_to_reconcile_request();
        assert_eq!(request.namespace, None);
        assert_eq!(request.name, "shared");
        assert_eq!(request.to_string(), "shared");
    }

    #[test]
    fn test_implicit_encodes_namespaced_name() {
        let request = GroupId::implicit("prod", "api").encode_to_reconcile_request();
        assert_eq!(request.namespace.as_deref(), Some("prod"));
        assert_eq!(request.name, "api");
        assert_eq!(request.to_string(), "prod/api");
    }

    #[test]
    fn test_empty_namespace_decodes_as_explicit() {
        let request = ReconcileRequest {
            namespace: Some(String::new()),
            name: "shared".to_string(),
        };
        assert_eq!(
            GroupId::decode_from_reconcile_request(&request),
            GroupId::Explicit {
                name: "shared".to_string()
            }
        );
    }
}
