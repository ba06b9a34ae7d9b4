//! First-match-wins translation of raw records into activities.

use crate::actor::{change_source, classify_actor};
use crate::compile::{CompiledPolicy, CompiledRule};
use crate::metrics::PolicyMetrics;
use activity_core::{
    Activity, ActivitySpec, Actor, ActorType, AuditRecord, ChangeSource, EventRecord, ObjectMeta,
    Origin, OriginType, ResourceRef,
};
use activity_filter::eval_bool;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub struct Translator {
    metrics: Arc<PolicyMetrics>,
}

impl Translator {
    pub fn new(metrics: Arc<PolicyMetrics>) -> Self {
        Self { metrics }
    }

    /// Translate one audit record against the current policy snapshot. Each
    /// matching policy contributes at most one activity, from its first
    /// matching rule.
    pub fn translate_audit(
        &self,
        record: &AuditRecord,
        policies: &[Arc<CompiledPolicy>],
    ) -> Vec<Activity> {
        let actor = classify_actor(
            &record.user.username,
            &record.user.uid,
            record.user.email.as_deref(),
        );
        let record_value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                log::error!("audit record {} failed to serialize: {}", record.audit_id, e);
                return Vec::new();
            }
        };

        let mut activities = Vec::new();
        for policy in policies {
            if !audit_target_matches(policy, record) {
                continue;
            }
            let env = json!({
                "audit": record_value,
                "actor": actor.name,
                "verb": record.verb,
                "kind": policy.target.kind,
            });
            if let Some((summary, links)) =
                self.first_match(&policy.name, &policy.audit_rules, &env)
            {
                activities.push(Activity {
                    metadata: activity_meta(&record.object_ref.namespace),
                    spec: ActivitySpec {
                        summary,
                        change_source: change_source(&actor, &record.user.username),
                        actor: actor.clone(),
                        resource: ResourceRef {
                            api_group: policy.target.api_group.clone(),
                            kind: policy.target.kind.clone(),
                            namespace: record.object_ref.namespace.clone(),
                            name: record.object_ref.name.clone(),
                            uid: String::new(),
                        },
                        links,
                        scope: record.scope.clone(),
                        origin: Origin {
                            origin_type: OriginType::Audit,
                            id: record.audit_id.clone(),
                        },
                        start_time: record.request_received_timestamp,
                        end_time: None,
                    },
                });
            }
        }

        self.observe(OriginType::Audit, activities.len());
        activities
    }

    /// Translate one event record. Events carry no acting user; the
    /// reporting component stands in as a controller actor.
    pub fn translate_event(
        &self,
        record: &EventRecord,
        policies: &[Arc<CompiledPolicy>],
    ) -> Vec<Activity> {
        let actor = Actor {
            actor_type: ActorType::Controller,
            name: record.reporting_component.clone(),
            email: None,
            uid: String::new(),
        };
        let record_value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                log::error!("event record {} failed to serialize: {}", record.id, e);
                return Vec::new();
            }
        };

        let mut activities = Vec::new();
        for policy in policies {
            if !event_target_matches(policy, record) {
                continue;
            }
            let env = json!({
                "event": record_value,
                "actor": actor.name,
                "reason": record.reason,
                "kind": record.involved_object.kind,
            });
            if let Some((summary, links)) =
                self.first_match(&policy.name, &policy.event_rules, &env)
            {
                activities.push(Activity {
                    metadata: activity_meta(&record.involved_object.namespace),
                    spec: ActivitySpec {
                        summary,
                        change_source: ChangeSource::System,
                        actor: actor.clone(),
                        resource: ResourceRef {
                            api_group: policy.target.api_group.clone(),
                            kind: policy.target.kind.clone(),
                            namespace: record.involved_object.namespace.clone(),
                            name: record.involved_object.name.clone(),
                            uid: record.involved_object.uid.clone(),
                        },
                        links,
                        scope: record.scope.clone(),
                        origin: Origin {
                            origin_type: OriginType::Event,
                            id: record.id.clone(),
                        },
                        start_time: record.timestamp,
                        end_time: None,
                    },
                });
            }
        }

        self.observe(OriginType::Event, activities.len());
        activities
    }

    /// Iterate rules in declared order; the first whose match evaluates
    /// true wins. A runtime evaluation error skips the record for this
    /// policy: the counter is bumped and the rule index logged, and the
    /// record is never retried (evaluation is deterministic).
    fn first_match(
        &self,
        policy_name: &str,
        rules: &[CompiledRule],
        env: &Value,
    ) -> Option<(String, Vec<activity_core::ActivityLink>)> {
        for (index, rule) in rules.iter().enumerate() {
            match eval_bool(&rule.matcher, env) {
                Ok(false) => continue,
                Ok(true) => match rule.summary.render(env) {
                    Ok(rendered) => return Some(rendered),
                    Err(e) => {
                        self.metrics.rule_errors_total.inc();
                        log::error!(
                            "policy {} rule {} summary failed: {}",
                            policy_name,
                            index,
                            e
                        );
                        return None;
                    }
                },
                Err(e) => {
                    self.metrics.rule_errors_total.inc();
                    log::error!("policy {} rule {} match failed: {}", policy_name, index, e);
                    return None;
                }
            }
        }
        None
    }

    fn observe(&self, origin: OriginType, emitted: usize) {
        if emitted == 0 {
            self.metrics
                .unmatched_total
                .with_label_values(&[origin.as_str()])
                .inc();
        } else {
            self.metrics
                .translated_total
                .with_label_values(&[origin.as_str()])
                .inc_by(emitted as u64);
        }
    }
}

fn activity_meta(namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: format!("act-{}", Uuid::new_v4()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        uid: None,
        resource_version: None,
        creation_timestamp: Some(Utc::now()),
        generation: None,
    }
}

/// Audit object references name plural resources while policy targets name
/// kinds; accept the kind itself or its naive plural, case-insensitively.
fn audit_target_matches(policy: &CompiledPolicy, record: &AuditRecord) -> bool {
    if policy.target.api_group != record.object_ref.api_group {
        return false;
    }
    let kind = policy.target.kind.to_ascii_lowercase();
    let resource = record.object_ref.resource.to_ascii_lowercase();
    resource == kind || resource == format!("{}s", kind)
}

fn event_target_matches(policy: &CompiledPolicy, record: &EventRecord) -> bool {
    policy.target.api_group == record.involved_object.api_group
        && policy.target.kind == record.involved_object.kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_policy;
    use activity_core::{
        ActivityPolicy, ActivityPolicySpec, AuditUser, EventType, InvolvedObject,
        ObjectReference, PolicyRule, PolicyTarget, ResponseStatus, Scope, ScopeType,
    };
    use activity_filter::FilterCache;

    fn translator() -> Translator {
        Translator::new(Arc::new(PolicyMetrics::unregistered()))
    }

    fn compiled(audit_rules: Vec<(&str, &str)>, event_rules: Vec<(&str, &str)>) -> Arc<CompiledPolicy> {
        let policy = ActivityPolicy {
            metadata: ObjectMeta::named("deployments"),
            spec: ActivityPolicySpec {
                target: PolicyTarget {
                    api_group: "apps".into(),
                    kind: "Deployment".into(),
                },
                audit_rules: audit_rules
                    .into_iter()
                    .map(|(m, s)| PolicyRule {
                        match_expression: m.into(),
                        summary: s.into(),
                    })
                    .collect(),
                event_rules: event_rules
                    .into_iter()
                    .map(|(m, s)| PolicyRule {
                        match_expression: m.into(),
                        summary: s.into(),
                    })
                    .collect(),
            },
            status: Default::default(),
        };
        Arc::new(compile_policy(&policy, &FilterCache::default()).unwrap())
    }

    fn audit_record() -> AuditRecord {
        AuditRecord {
            audit_id: "a-1".into(),
            request_received_timestamp: Utc::now(),
            scope: Scope::new(ScopeType::Project, "backend-api"),
            verb: "create".into(),
            user: AuditUser {
                username: "jane@example.com".into(),
                uid: "u-42".into(),
                email: None,
            },
            object_ref: ObjectReference {
                api_group: "apps".into(),
                resource: "deployments".into(),
                namespace: "prod".into(),
                name: "web".into(),
            },
            response_status: ResponseStatus { code: 201 },
            payload: Value::Null,
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let policy = compiled(
            vec![
                ("audit.verb == 'delete'", "{actor} deleted {audit.objectRef.name}"),
                ("audit.verb == 'create'", "{actor} created {audit.objectRef.name}"),
                ("audit.verb == 'create'", "should never render"),
            ],
            vec![],
        );
        let activities = translator().translate_audit(&audit_record(), &[policy]);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].spec.summary, "jane@example.com created web");
    }

    #[test]
    fn activity_carries_origin_and_target_invariants() {
        let policy = compiled(vec![("audit.verb == 'create'", "x")], vec![]);
        let record = audit_record();
        let activities = translator().translate_audit(&record, &[policy.clone()]);
        let activity = &activities[0];
        assert_eq!(activity.spec.origin.id, record.audit_id);
        assert_eq!(activity.spec.origin.origin_type, OriginType::Audit);
        assert_eq!(activity.spec.resource.api_group, policy.target.api_group);
        assert_eq!(activity.spec.resource.kind, "Deployment");
        assert_eq!(activity.spec.scope, record.scope);
        assert_eq!(activity.spec.change_source, ChangeSource::Human);
        assert_eq!(activity.spec.actor.uid, "u-42");
        assert_eq!(activity.metadata.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn non_matching_target_is_skipped() {
        let policy = compiled(vec![("audit.verb == 'create'", "x")], vec![]);
        let mut record = audit_record();
        record.object_ref.resource = "statefulsets".into();
        assert!(translator().translate_audit(&record, &[policy]).is_empty());
    }

    #[test]
    fn runtime_rule_error_skips_the_record_without_activity() {
        // Ordering against a field the delivered payload does not carry is
        // a runtime rule error: no activity, counter bumped, not retried.
        let policy = compiled(
            vec![("audit.responseStatus.code >= 200", "never rendered")],
            vec![],
        );
        let metrics = Arc::new(PolicyMetrics::unregistered());
        let translator = Translator::new(Arc::clone(&metrics));

        let env = serde_json::json!({
            "audit": {"verb": "create"},
            "actor": "jane",
            "verb": "create",
            "kind": "Deployment"
        });
        assert!(translator
            .first_match("deployments", &policy.audit_rules, &env)
            .is_none());
        assert_eq!(metrics.rule_errors_total.get(), 1);
    }

    #[test]
    fn event_translation_uses_event_rules() {
        let policy = compiled(
            vec![("audit.verb == 'create'", "audit side")],
            vec![("event.reason == 'Killing'", "{kind} {event.involvedObject.name} was killed")],
        );
        let record = EventRecord {
            id: "e-1".into(),
            timestamp: Utc::now(),
            scope: Scope::new(ScopeType::Project, "backend-api"),
            involved_object: InvolvedObject {
                api_group: "apps".into(),
                kind: "Deployment".into(),
                namespace: "prod".into(),
                name: "web".into(),
                uid: "o-9".into(),
            },
            reason: "Killing".into(),
            event_type: EventType::Warning,
            reporting_component: "kubelet".into(),
            message: "killing container".into(),
            payload: Value::Null,
        };
        let activities = translator().translate_event(&record, &[policy]);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].spec.summary, "Deployment web was killed");
        assert_eq!(activities[0].spec.origin.origin_type, OriginType::Event);
        assert_eq!(activities[0].spec.origin.id, "e-1");
        assert_eq!(activities[0].spec.change_source, ChangeSource::System);
        assert_eq!(activities[0].spec.resource.uid, "o-9");
    }
}
