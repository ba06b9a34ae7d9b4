//! Hierarchical subject grammar and routing helpers.
//!
//! Subjects are dot-separated token chains. In patterns, `_` matches any
//! single token and `>` matches all remaining tokens. Dots inside a token
//! (API group names) are substituted with underscores before joining, and
//! absent segments publish as the `_` placeholder so that subjects keep a
//! fixed arity per tree.

use activity_core::{InvolvedObject, OriginType, ResourceRef, Scope};

/// Subject raw audit records are ingested on.
pub const AUDIT_SUBJECT: &str = "audit.records";

/// Root token of the event subject tree.
pub const EVENT_PREFIX: &str = "events";

/// Root token of the activity subject tree.
pub const ACTIVITY_PREFIX: &str = "activities";

/// Tenant type token used when no tenant scope applies.
pub const GLOBAL_TENANT: &str = "global";

/// Make a value safe to use as one subject token: dots become underscores,
/// absent values become the `_` placeholder.
pub fn token(value: &str) -> String {
    if value.is_empty() {
        "_".to_string()
    } else {
        value.replace('.', "_")
    }
}

fn tenant_tokens(scope: &Scope) -> (String, String) {
    if scope.is_platform() {
        (GLOBAL_TENANT.to_string(), "_".to_string())
    } else {
        (scope.scope_type.as_str().to_string(), token(&scope.name))
    }
}

/// `events.<tenantType>.<tenantName>.<group_kind>.<namespace>.<name>`
pub fn event_subject(scope: &Scope, object: &InvolvedObject) -> String {
    let (tenant_type, tenant_name) = tenant_tokens(scope);
    format!(
        "{}.{}.{}.{}.{}.{}",
        EVENT_PREFIX,
        tenant_type,
        tenant_name,
        group_kind(&object.api_group, &object.kind),
        token(&object.namespace),
        token(&object.name),
    )
}

/// `activities.<tenantType>.<tenantName>.<group>.<source>.<kind>.<namespace>.<name>`
pub fn activity_subject(
    scope: &Scope,
    origin: OriginType,
    resource: &ResourceRef,
) -> String {
    let (tenant_type, tenant_name) = tenant_tokens(scope);
    format!(
        "{}.{}.{}.{}.{}.{}.{}.{}",
        ACTIVITY_PREFIX,
        tenant_type,
        tenant_name,
        token(&resource.api_group),
        origin.as_str(),
        token(&resource.kind),
        token(&resource.namespace),
        token(&resource.name),
    )
}

/// Combined `<group>_<kind>` token; the kind stands alone for the core group.
pub fn group_kind(api_group: &str, kind: &str) -> String {
    if kind.is_empty() {
        return "_".to_string();
    }
    if api_group.is_empty() {
        kind.to_string()
    } else {
        format!("{}_{}", api_group.replace('.', "_"), kind)
    }
}

/// Match a subject against a pattern. `_` matches exactly one token; `>`
/// matches one or more remaining tokens and only makes sense terminally.
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(">"), Some(_)) => return true,
            (Some(p), Some(s)) if p == "_" || p == s => continue,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::ScopeType;

    fn project_scope() -> Scope {
        Scope::new(ScopeType::Project, "backend-api")
    }

    #[test]
    fn event_subject_shape() {
        let object = InvolvedObject {
            api_group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "prod".into(),
            name: "web".into(),
            uid: "o-1".into(),
        };
        assert_eq!(
            event_subject(&project_scope(), &object),
            "events.project.backend-api.apps_Deployment.prod.web"
        );
    }

    #[test]
    fn dots_in_groups_become_underscores() {
        let object = InvolvedObject {
            api_group: "networking.k8s.io".into(),
            kind: "Ingress".into(),
            namespace: "prod".into(),
            name: "edge".into(),
            uid: "o-2".into(),
        };
        let subject = event_subject(&project_scope(), &object);
        assert!(subject.contains("networking_k8s_io_Ingress"));
    }

    #[test]
    fn platform_scope_publishes_under_global() {
        let object = InvolvedObject::default();
        let subject = event_subject(&Scope::platform(), &object);
        assert!(subject.starts_with("events.global._."));
    }

    #[test]
    fn absent_segments_use_placeholder() {
        let object = InvolvedObject {
            api_group: String::new(),
            kind: "Pod".into(),
            namespace: String::new(),
            name: String::new(),
            uid: String::new(),
        };
        assert_eq!(
            event_subject(&project_scope(), &object),
            "events.project.backend-api.Pod._._"
        );
    }

    #[test]
    fn activity_subject_shape() {
        let resource = ResourceRef {
            api_group: "apps".into(),
            kind: "Deployment".into(),
            namespace: "prod".into(),
            name: "web".into(),
            uid: "r-1".into(),
        };
        assert_eq!(
            activity_subject(&project_scope(), OriginType::Audit, &resource),
            "activities.project.backend-api.apps.audit.Deployment.prod.web"
        );
    }

    #[test]
    fn pattern_matching_with_wildcards() {
        assert!(matches(
            "events.project.backend-api.>",
            "events.project.backend-api.apps_Deployment.prod.web"
        ));
        assert!(matches(
            "events.project.backend-api.apps_Deployment._._",
            "events.project.backend-api.apps_Deployment._._"
        ));
        assert!(matches(
            "events._._.>",
            "events.global._.Pod.prod.web"
        ));
        assert!(!matches(
            "events.project.frontend.>",
            "events.project.backend-api.apps_Deployment.prod.web"
        ));
        assert!(!matches(
            "events.project.backend-api",
            "events.project.backend-api.apps_Deployment.prod.web"
        ));
        // `>` requires at least one remaining token.
        assert!(!matches("events.>", "events"));
    }
}
