//! Ingress grouping
//!
//! Ingresses annotated with `rauta.io/group.name` share one load balancer and
//! are reconciled together. Unannotated ingresses form a group of one.
//!
//! ```yaml
//! metadata:
//!   annotations:
//!     rauta.io/group.name: shared-edge   # explicit group
//!     rauta.io/group.order: "10"         # position within the group (optional)
//! ```

use crate::apis::ingress::class::ClassFilter;
use crate::apis::ingress::lister::IngressLister;
use crate::error::RautaError;
use common::GroupId;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;

pub const GROUP_NAME_ANNOTATION: &str = "rauta.io/group.name";
pub const GROUP_ORDER_ANNOTATION: &str = "rauta.io/group.order";

pub const MIN_GROUP_ORDER: i32 = -1000;
pub const MAX_GROUP_ORDER: i32 = 1000;

/// Derives the group an ingress is reconciled with
pub trait GroupBuilder: Send + Sync {
    fn build_group_id(&self, ingress: &Ingress) -> Result<GroupId, RautaError>;
}

/// Annotation-based group builder
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationGroupBuilder;

impl GroupBuilder for AnnotationGroupBuilder {
    fn build_group_id(&self, ingress: &Ingress) -> Result<GroupId, RautaError> {
        let (namespace, name) = namespaced_name(ingress)?;

        match annotation(ingress, GROUP_NAME_ANNOTATION) {
            Some(group_name) => Ok(GroupId::explicit(group_name)?),
            None => Ok(GroupId::implicit(namespace, name)),
        }
    }
}

/// `namespace/name` of an ingress, for log attribution
pub fn ingress_key(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.metadata.namespace.as_deref().unwrap_or(""),
        ingress.metadata.name.as_deref().unwrap_or("")
    )
}

fn namespaced_name(ingress: &Ingress) -> Result<(&str, &str), RautaError> {
    let namespace = ingress
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .ok_or(RautaError::MissingMetadata {
            kind: "Ingress",
            field: "namespace",
        })?;
    let name = ingress
        .metadata
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(RautaError::MissingMetadata {
            kind: "Ingress",
            field: "name",
        })?;
    Ok((namespace, name))
}

fn annotation<'a>(ingress: &'a Ingress, key: &str) -> Option<&'a str> {
    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

/// Position of an ingress within its group (default 0)
pub fn group_order(ingress: &Ingress) -> Result<i32, RautaError> {
    let Some(raw) = annotation(ingress, GROUP_ORDER_ANNOTATION) else {
        return Ok(0);
    };

    let invalid = || RautaError::InvalidGroupOrder {
        ingress: ingress_key(ingress),
        value: raw.to_string(),
        min: MIN_GROUP_ORDER,
        max: MAX_GROUP_ORDER,
    };

    let order: i32 = raw.trim().parse().map_err(|_| invalid())?;
    if !(MIN_GROUP_ORDER..=MAX_GROUP_ORDER).contains(&order) {
        return Err(invalid());
    }
    Ok(order)
}

/// Load the members of one group, ordered by group order then namespaced name
///
/// Ingresses whose group cannot be built are not members of any group and
/// are skipped here; the enqueue path reports them.
pub fn load_group_members(
    lister: &dyn IngressLister,
    class_filter: ClassFilter,
    ingress_class: &str,
    builder: &dyn GroupBuilder,
    group: &GroupId,
) -> Result<Vec<Arc<Ingress>>, RautaError> {
    let mut members = Vec::new();

    for ingress in lister.list()? {
        if !class_filter(ingress_class, &ingress) {
            continue;
        }
        match builder.build_group_id(&ingress) {
            Ok(id) if &id == group => {
                let order = group_order(&ingress)?;
                members.push((order, ingress_key(&ingress), ingress));
            }
            _ => continue,
        }
    }

    members.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    Ok(members.into_iter().map(|(_, _, ingress)| ingress).collect())
}
