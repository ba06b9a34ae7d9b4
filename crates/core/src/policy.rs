//! Activity policy resources: user-authored translation rules.

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The resource kind a policy translates records for. Immutable after
/// create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTarget {
    #[serde(default)]
    pub api_group: String,
    pub kind: String,
}

/// One translation rule: a match predicate and a summary template.
/// Within a policy, the first rule whose match evaluates true wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    #[serde(rename = "match")]
    pub match_expression: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPolicySpec {
    pub target: PolicyTarget,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_rules: Vec<PolicyRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_rules: Vec<PolicyRule>,
}

/// Compile readiness of an admitted policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PolicyPhase {
    /// Freshly admitted; compilation queued.
    Pending,
    /// Every rule compiled.
    Ready,
    /// At least one rule failed to compile after admission (for example
    /// after a schema bump).
    Failed,
}

impl Default for PolicyPhase {
    fn default() -> Self {
        PolicyPhase::Pending
    }
}

/// Diagnostic for a rule that failed compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleDiagnostic {
    /// Field path of the offending rule, e.g. `spec.auditRules[2].match`.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPolicyStatus {
    #[serde(default)]
    pub phase: PolicyPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<RuleDiagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Cluster-scoped declaration mapping raw records of one target kind to
/// activities. Spec is mutable except for the target; status is set only
/// through the status sub-endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPolicy {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ActivityPolicySpec,
    #[serde(default)]
    pub status: ActivityPolicyStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_round_trips_with_match_keyword() {
        let rule = PolicyRule {
            match_expression: "verb == 'create'".into(),
            summary: "{actor} created {objectRef.name}".into(),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["match"], "verb == 'create'");
        let back: PolicyRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }
}
