//! Ingress class filtering

use k8s_openapi::api::networking::v1::Ingress;

/// Legacy class annotation, still honoured before `spec.ingressClassName`
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Class served when no class is configured
pub const DEFAULT_INGRESS_CLASS: &str = "rauta";

/// Decides whether an ingress belongs to the configured class
pub type ClassFilter = fn(&str, &Ingress) -> bool;

/// Class of an ingress: annotation first, then `spec.ingressClassName`
pub fn ingress_class(ingress: &Ingress) -> Option<&str> {
    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(INGRESS_CLASS_ANNOTATION))
        .or_else(|| {
            ingress
                .spec
                .as_ref()
                .and_then(|spec| spec.ingress_class_name.as_ref())
        })
        .map(String::as_str)
}

/// Match an ingress against the configured class
///
/// With no configured class, unclassed ingresses and the default class match.
pub fn matches_ingress_class(configured: &str, ingress: &Ingress) -> bool {
    let actual = ingress_class(ingress).unwrap_or("");
    if configured.is_empty() {
        return actual.is_empty() || actual == DEFAULT_INGRESS_CLASS;
    }
    actual == configured
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::IngressSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn ingress(annotation: Option<&str>, class_name: Option<&str>) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("default".to_string()),
                annotations: annotation.map(|class| {
                    BTreeMap::from([(INGRESS_CLASS_ANNOTATION.to_string(), class.to_string())])
                }),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: class_name.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_configured_class_matches_unclassed_and_default() {
        assert!(matches_ingress_class("", &ingress(None, None)));
        assert!(matches_ingress_class("", &ingress(Some("rauta"), None)));
        assert!(matches_ingress_class("", &ingress(None, Some("rauta"))));
        assert!(!matches_ingress_class("", &ingress(Some("nginx"), None)));
    }

    #[test]
    fn test_configured_class_requires_exact_match() {
        assert!(matches_ingress_class("internal", &ingress(Some("internal"), None)));
        assert!(matches_ingress_class("internal", &ingress(None, Some("internal"))));
        assert!(!matches_ingress_class("internal", &ingress(None, None)));
        assert!(!matches_ingress_class("internal", &ingress(Some("Internal"), None)));
    }

    #[test]
    fn test_annotation_takes_precedence_over_spec() {
        let both = ingress(Some("nginx"), Some("rauta"));
        assert_eq!(ingress_class(&both), Some("nginx"));
        assert!(!matches_ingress_class("rauta", &both));
    }
}
