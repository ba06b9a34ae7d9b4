//! Subject pattern construction for watch routing.

use activity_core::Scope;
use message_log::subject::token;

/// Narrowing tokens a watch may pin, in subject order after the tenant.
/// Anything left `None` becomes a `_` wildcard, and a fully absent tail
/// collapses into `>`.
#[derive(Debug, Clone, Default)]
pub struct Narrowing {
    pub segments: Vec<Option<String>>,
}

/// Build the consumer subject pattern for one watch.
///
/// Tenant scopes pin their two tenant tokens so the log prefilters other
/// tenants entirely; platform and user scopes watch every tenant and rely
/// on the server-side stage for anything finer. Platform-published records
/// live under the `global` tenant token.
pub fn watch_pattern(prefix: &str, scope: &Scope, narrowing: &Narrowing) -> String {
    let mut segments: Vec<Option<String>> = Vec::new();
    if scope.is_platform() && narrowing.segments.iter().all(Option::is_none) {
        return format!("{}.>", prefix);
    }
    match scope.scope_type {
        activity_core::ScopeType::Organization | activity_core::ScopeType::Project => {
            segments.push(Some(scope.scope_type.as_str().to_string()));
            segments.push(Some(token(&scope.name)));
        }
        // Platform watches all tenants; user scope cannot be expressed as
        // a subject token and filters server-side instead.
        _ => {
            segments.push(None);
            segments.push(None);
        }
    }
    segments.extend(narrowing.segments.iter().cloned());

    let last_pinned = segments.iter().rposition(Option::is_some);
    match last_pinned {
        None => format!("{}.>", prefix),
        Some(last) => {
            let mut tokens = vec![prefix.to_string()];
            for segment in &segments[..=last] {
                tokens.push(segment.clone().unwrap_or_else(|| "_".to_string()));
            }
            // Everything after the last pinned token stays open.
            tokens.push(">".to_string());
            tokens.join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::ScopeType;
    use message_log::subject;

    #[test]
    fn project_scope_pins_tenant_tokens() {
        let scope = Scope::new(ScopeType::Project, "backend-api");
        assert_eq!(
            watch_pattern("events", &scope, &Narrowing::default()),
            "events.project.backend-api.>"
        );
    }

    #[test]
    fn platform_scope_watches_everything() {
        assert_eq!(
            watch_pattern("events", &Scope::platform(), &Narrowing::default()),
            "events.>"
        );
    }

    #[test]
    fn narrowing_pins_interior_segments() {
        let scope = Scope::new(ScopeType::Project, "backend-api");
        let narrowing = Narrowing {
            segments: vec![Some("apps_Deployment".to_string()), Some("prod".to_string()), None],
        };
        assert_eq!(
            watch_pattern("events", &scope, &narrowing),
            "events.project.backend-api.apps_Deployment.prod.>"
        );
    }

    #[test]
    fn user_scope_keeps_tenant_open_for_server_side_filtering() {
        let scope = Scope::new(ScopeType::User, "u-42");
        let narrowing = Narrowing {
            segments: vec![Some("Pod".to_string())],
        };
        assert_eq!(watch_pattern("events", &scope, &narrowing), "events._._.Pod.>");
    }

    #[test]
    fn patterns_match_published_subjects() {
        let scope = Scope::new(ScopeType::Project, "backend-api");
        let pattern = watch_pattern("events", &scope, &Narrowing::default());
        let published = subject::event_subject(
            &scope,
            &activity_core::InvolvedObject {
                api_group: "apps".into(),
                kind: "Deployment".into(),
                namespace: "prod".into(),
                name: "web".into(),
                uid: "o-1".into(),
            },
        );
        assert!(subject::matches(&pattern, &published));
    }
}
