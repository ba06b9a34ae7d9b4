//! Policy previews: evaluate a policy spec against in-line samples,
//! without admitting anything.

use crate::compile::compile_policy;
use crate::engine::Translator;
use activity_core::{
    Activity, ActivityPolicy, ActivityPolicySpec, ActivityResult, AuditRecord, EventRecord,
    ObjectMeta,
};
use activity_filter::FilterCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPreviewSpec {
    pub policy: ActivityPolicySpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_samples: Vec<AuditRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_samples: Vec<EventRecord>,
}

/// Outcome for one sample input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    /// Which sample this refers to, e.g. `auditSamples[1]`.
    pub input: String,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPreviewStatus {
    #[serde(default)]
    pub results: Vec<PreviewResult>,
}

/// Ephemeral preview resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPreview {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: PolicyPreviewSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PolicyPreviewStatus>,
}

impl PolicyPreview {
    pub const KIND: &'static str = "PolicyPreview";
}

/// Compile the in-line policy (rejecting it exactly as admission would) and
/// run each sample through the translator.
pub fn run_preview(
    translator: &Translator,
    cache: &FilterCache,
    spec: &PolicyPreviewSpec,
) -> ActivityResult<PolicyPreviewStatus> {
    let probe = ActivityPolicy {
        spec: spec.policy.clone(),
        metadata: ObjectMeta::named("preview"),
        ..Default::default()
    };
    let compiled = compile_policy(&probe, cache).map_err(|diagnostics| {
        let first = &diagnostics[0];
        activity_core::ActivityError::invalid(
            format!("spec.policy.{}", first.field.trim_start_matches("spec.")),
            &first.message,
        )
    })?;
    let policies = [Arc::new(compiled)];

    let mut results = Vec::new();
    for (index, sample) in spec.audit_samples.iter().enumerate() {
        let activities = translator.translate_audit(sample, &policies);
        results.push(PreviewResult {
            input: format!("auditSamples[{}]", index),
            matched: !activities.is_empty(),
            activity: activities.into_iter().next(),
        });
    }
    for (index, sample) in spec.event_samples.iter().enumerate() {
        let activities = translator.translate_event(sample, &policies);
        results.push(PreviewResult {
            input: format!("eventSamples[{}]", index),
            matched: !activities.is_empty(),
            activity: activities.into_iter().next(),
        });
    }

    Ok(PolicyPreviewStatus { results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PolicyMetrics;
    use activity_core::{
        AuditUser, ObjectReference, PolicyRule, PolicyTarget, ResponseStatus, Scope, ScopeType,
    };
    use chrono::Utc;

    fn preview_spec() -> PolicyPreviewSpec {
        PolicyPreviewSpec {
            policy: ActivityPolicySpec {
                target: PolicyTarget {
                    api_group: "apps".into(),
                    kind: "Deployment".into(),
                },
                audit_rules: vec![PolicyRule {
                    match_expression: "audit.verb == 'delete'".into(),
                    summary: "{actor} deleted {audit.objectRef.name}".into(),
                }],
                event_rules: vec![],
            },
            audit_samples: vec![
                sample("delete", "web"),
                sample("create", "api"),
            ],
            event_samples: vec![],
        }
    }

    fn sample(verb: &str, name: &str) -> AuditRecord {
        AuditRecord {
            audit_id: format!("a-{}", name),
            request_received_timestamp: Utc::now(),
            scope: Scope::new(ScopeType::Project, "backend-api"),
            verb: verb.into(),
            user: AuditUser {
                username: "jane@example.com".into(),
                uid: "u-42".into(),
                email: None,
            },
            object_ref: ObjectReference {
                api_group: "apps".into(),
                resource: "deployments".into(),
                namespace: "prod".into(),
                name: name.into(),
            },
            response_status: ResponseStatus { code: 200 },
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn preview_reports_per_sample_outcomes() {
        let translator = Translator::new(std::sync::Arc::new(PolicyMetrics::unregistered()));
        let cache = FilterCache::default();
        let status = run_preview(&translator, &cache, &preview_spec()).unwrap();

        assert_eq!(status.results.len(), 2);
        assert!(status.results[0].matched);
        assert_eq!(
            status.results[0].activity.as_ref().unwrap().spec.summary,
            "jane@example.com deleted web"
        );
        assert!(!status.results[1].matched);
        assert!(status.results[1].activity.is_none());
    }

    #[test]
    fn preview_rejects_uncompilable_policies() {
        let translator = Translator::new(std::sync::Arc::new(PolicyMetrics::unregistered()));
        let cache = FilterCache::default();
        let mut spec = preview_spec();
        spec.policy.audit_rules[0].match_expression = "event.reason == 'x'".into();
        let err = run_preview(&translator, &cache, &spec).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_string().contains("spec.policy.auditRules[0].match"));
    }
}
