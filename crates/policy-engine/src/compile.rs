//! Rule compilation, admission validation, and the policy status machine.

use crate::template::CompiledTemplate;
use activity_core::{
    ActivityError, ActivityPolicy, ActivityPolicySpec, ActivityPolicyStatus, ActivityResult,
    PolicyPhase, PolicyRule, PolicyTarget, RuleDiagnostic,
};
use activity_filter::{schema, FilterCache, Schema, TypedExpr};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub matcher: Arc<TypedExpr>,
    pub summary: CompiledTemplate,
}

/// One policy, fully compiled. Evaluators only ever see these, never the
/// raw expression text.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub name: String,
    pub target: PolicyTarget,
    pub audit_rules: Vec<CompiledRule>,
    pub event_rules: Vec<CompiledRule>,
}

fn compile_rules(
    rules: &[PolicyRule],
    list_field: &str,
    rule_schema: &'static Schema,
    cache: &FilterCache,
    diagnostics: &mut Vec<RuleDiagnostic>,
) -> Vec<CompiledRule> {
    let mut compiled = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        if rule.match_expression.trim().is_empty() {
            diagnostics.push(RuleDiagnostic {
                field: format!("spec.{}[{}].match", list_field, index),
                message: "match expression must not be empty".to_string(),
            });
            continue;
        }
        if rule.summary.trim().is_empty() {
            diagnostics.push(RuleDiagnostic {
                field: format!("spec.{}[{}].summary", list_field, index),
                message: "summary template must not be empty".to_string(),
            });
            continue;
        }

        let matcher = match cache.compile(rule_schema, &rule.match_expression) {
            Ok(matcher) => matcher,
            Err(e) => {
                diagnostics.push(RuleDiagnostic {
                    field: format!("spec.{}[{}].match", list_field, index),
                    message: e.to_string(),
                });
                continue;
            }
        };
        let summary = match CompiledTemplate::compile(&rule.summary, rule_schema) {
            Ok(summary) => summary,
            Err(e) => {
                diagnostics.push(RuleDiagnostic {
                    field: format!("spec.{}[{}].summary", list_field, index),
                    message: e.to_string(),
                });
                continue;
            }
        };
        compiled.push(CompiledRule { matcher, summary });
    }
    compiled
}

/// Compile every rule of a policy. On any failure the full diagnostic list
/// is returned; partial compilation output is discarded.
pub fn compile_policy(
    policy: &ActivityPolicy,
    cache: &FilterCache,
) -> Result<CompiledPolicy, Vec<RuleDiagnostic>> {
    let mut diagnostics = Vec::new();

    if policy.spec.target.kind.trim().is_empty() {
        diagnostics.push(RuleDiagnostic {
            field: "spec.target.kind".to_string(),
            message: "target kind is required".to_string(),
        });
    }

    let audit_rules = compile_rules(
        &policy.spec.audit_rules,
        "auditRules",
        schema::rule_audit(),
        cache,
        &mut diagnostics,
    );
    let event_rules = compile_rules(
        &policy.spec.event_rules,
        "eventRules",
        schema::rule_event(),
        cache,
        &mut diagnostics,
    );

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    Ok(CompiledPolicy {
        name: policy.metadata.name.clone(),
        target: policy.spec.target.clone(),
        audit_rules,
        event_rules,
    })
}

/// Admission gate: a spec whose rules do not compile is rejected with the
/// first offending field path and the compiler message.
pub fn validate_policy(spec: &ActivityPolicySpec, cache: &FilterCache) -> ActivityResult<()> {
    let probe = ActivityPolicy {
        spec: spec.clone(),
        ..Default::default()
    };
    match compile_policy(&probe, cache) {
        Ok(_) => Ok(()),
        Err(diagnostics) => {
            let first = &diagnostics[0];
            Err(ActivityError::invalid(&first.field, &first.message))
        }
    }
}

/// Drive the status machine from the compilation cache: `Ready` when every
/// rule compiles, `Failed` with diagnostics otherwise. Freshly admitted
/// policies sit at `Pending` until first reconciled.
pub fn reconcile_status(policy: &ActivityPolicy, cache: &FilterCache) -> ActivityPolicyStatus {
    match compile_policy(policy, cache) {
        Ok(_) => ActivityPolicyStatus {
            phase: PolicyPhase::Ready,
            diagnostics: Vec::new(),
            observed_generation: policy.metadata.generation,
        },
        Err(diagnostics) => ActivityPolicyStatus {
            phase: PolicyPhase::Failed,
            diagnostics,
            observed_generation: policy.metadata.generation,
        },
    }
}

/// The evaluator-facing policy snapshot. Admission swaps in a fresh
/// immutable set; evaluation never observes a partially updated list.
pub struct PolicySet {
    inner: RwLock<Arc<Vec<Arc<CompiledPolicy>>>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<CompiledPolicy>>> {
        Arc::clone(&self.inner.read().unwrap())
    }

    /// Replace the whole set; callers rebuild it from the policy store
    /// after any admission.
    pub fn replace(&self, policies: Vec<Arc<CompiledPolicy>>) {
        *self.inner.write().unwrap() = Arc::new(policies);
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_core::ObjectMeta;

    fn rule(m: &str, s: &str) -> PolicyRule {
        PolicyRule {
            match_expression: m.to_string(),
            summary: s.to_string(),
        }
    }

    fn policy(audit_rules: Vec<PolicyRule>, event_rules: Vec<PolicyRule>) -> ActivityPolicy {
        ActivityPolicy {
            metadata: ObjectMeta::named("deployments-policy"),
            spec: ActivityPolicySpec {
                target: PolicyTarget {
                    api_group: "apps".into(),
                    kind: "Deployment".into(),
                },
                audit_rules,
                event_rules,
            },
            status: ActivityPolicyStatus::default(),
        }
    }

    #[test]
    fn compiles_a_well_formed_policy() {
        let cache = FilterCache::default();
        let p = policy(
            vec![rule("audit.verb == 'create'", "{actor} created {kind}")],
            vec![rule("event.reason == 'Killing'", "{kind} was killed")],
        );
        let compiled = compile_policy(&p, &cache).unwrap();
        assert_eq!(compiled.audit_rules.len(), 1);
        assert_eq!(compiled.event_rules.len(), 1);
        assert_eq!(compiled.target.api_group, "apps");
    }

    #[test]
    fn missing_kind_is_rejected() {
        let cache = FilterCache::default();
        let mut p = policy(vec![rule("audit.verb == 'create'", "x")], vec![]);
        p.spec.target.kind = String::new();
        let err = validate_policy(&p.spec, &cache).unwrap_err();
        assert!(err.to_string().contains("spec.target.kind"));
    }

    #[test]
    fn empty_match_and_summary_are_rejected_with_field_paths() {
        let cache = FilterCache::default();
        let p = policy(vec![rule("", "summary")], vec![]);
        let err = validate_policy(&p.spec, &cache).unwrap_err();
        assert!(err.to_string().contains("spec.auditRules[0].match"));

        let p = policy(vec![rule("audit.verb == 'get'", "  ")], vec![]);
        let err = validate_policy(&p.spec, &cache).unwrap_err();
        assert!(err.to_string().contains("spec.auditRules[0].summary"));
    }

    #[test]
    fn cross_binding_references_fail_admission() {
        let cache = FilterCache::default();
        let p = policy(vec![rule("event.reason == 'Killing'", "x")], vec![]);
        let err = validate_policy(&p.spec, &cache).unwrap_err();
        assert!(err.to_string().contains("spec.auditRules[0].match"));
        assert!(err.to_string().contains("event.reason"));

        let p = policy(vec![], vec![rule("audit.verb == 'get'", "x")]);
        let err = validate_policy(&p.spec, &cache).unwrap_err();
        assert!(err.to_string().contains("spec.eventRules[0].match"));
    }

    #[test]
    fn status_machine_transitions_with_spec_changes() {
        let cache = FilterCache::default();
        let mut p = policy(vec![rule("audit.verb == 'create'", "{actor} created {kind}")], vec![]);
        assert_eq!(p.status.phase, PolicyPhase::Pending);

        let status = reconcile_status(&p, &cache);
        assert_eq!(status.phase, PolicyPhase::Ready);

        p.spec.audit_rules[0].match_expression = "audit.nosuch == 'x'".into();
        let status = reconcile_status(&p, &cache);
        assert_eq!(status.phase, PolicyPhase::Failed);
        assert_eq!(status.diagnostics[0].field, "spec.auditRules[0].match");

        p.spec.audit_rules[0].match_expression = "audit.verb == 'create'".into();
        let status = reconcile_status(&p, &cache);
        assert_eq!(status.phase, PolicyPhase::Ready);
    }

    #[test]
    fn snapshot_swaps_are_atomic() {
        let cache = FilterCache::default();
        let set = PolicySet::new();
        assert!(set.snapshot().is_empty());

        let p = policy(vec![rule("audit.verb == 'create'", "x {kind}")], vec![]);
        let compiled = Arc::new(compile_policy(&p, &cache).unwrap());
        let before = set.snapshot();
        set.replace(vec![compiled]);
        // The old snapshot is unaffected by the swap.
        assert!(before.is_empty());
        assert_eq!(set.snapshot().len(), 1);
    }
}
