//! Wire shapes for the ephemeral query resources.
//!
//! Ephemeral resources are created with a `spec` and returned with
//! `status.results` filled in-band; nothing is persisted.

use activity_core::{Activity, AuditRecord, EventRecord, ObjectMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shared spec for the record query resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    /// RFC3339 or `now[-N<m|h|d>]`.
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "continue")]
    pub continue_token: Option<String>,
}

/// Parameters accepted by the standard list verbs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub field_selector: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default, rename = "continue")]
    pub continue_token: Option<String>,
}

fn api_version_value() -> String {
    format!("{}/{}", activity_core::API_GROUP, activity_core::API_VERSION)
}

macro_rules! query_resource {
    ($(#[$doc:meta])* $name:ident, $status:ident, $record:ty, $kind:literal) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "camelCase")]
        pub struct $status {
            #[serde(default)]
            pub results: Vec<$record>,
            #[serde(default, skip_serializing_if = "Option::is_none", rename = "continue")]
            pub continue_token: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            #[schema(value_type = Option<String>, format = "date-time")]
            pub effective_start_time: Option<DateTime<Utc>>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            #[schema(value_type = Option<String>, format = "date-time")]
            pub effective_end_time: Option<DateTime<Utc>>,
        }

        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            #[serde(default)]
            pub api_version: String,
            #[serde(default)]
            pub kind: String,
            #[serde(default)]
            pub metadata: ObjectMeta,
            pub spec: QuerySpec,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub status: Option<$status>,
        }

        impl $name {
            pub const KIND: &'static str = $kind;

            /// The response shape: echoed spec plus in-band results.
            pub fn answered(spec: QuerySpec, status: $status) -> Self {
                Self {
                    api_version: api_version_value(),
                    kind: Self::KIND.to_string(),
                    metadata: ObjectMeta::default(),
                    spec,
                    status: Some(status),
                }
            }
        }
    };
}

query_resource!(
    /// Ephemeral query over raw audit records.
    AuditLogQuery,
    AuditLogQueryStatus,
    AuditRecord,
    "AuditLogQuery"
);
query_resource!(
    /// Ephemeral query over translated activities.
    ActivityQuery,
    ActivityQueryStatus,
    Activity,
    "ActivityQuery"
);
query_resource!(
    /// Ephemeral query over observed events.
    EventQuery,
    EventQueryStatus,
    EventRecord,
    "EventQuery"
);

/// One requested facet aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacetRequest {
    /// Identifier path from the resource's filter schema.
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Shared spec for the facet query resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacetQuerySpec {
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub facets: Vec<FacetRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacetValueCount {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacetQueryStatus {
    #[serde(default)]
    pub facets: Vec<crate::facets::FacetResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub effective_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub effective_end_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_spec_round_trips_continue_keyword() {
        let spec: QuerySpec = serde_json::from_value(json!({
            "startTime": "now-1h",
            "endTime": "now",
            "filter": "verb == 'create'",
            "limit": 50,
            "continue": "abc"
        }))
        .unwrap();
        assert_eq!(spec.continue_token.as_deref(), Some("abc"));
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["continue"], "abc");
        assert_eq!(back["startTime"], "now-1h");
    }

    #[test]
    fn answered_queries_carry_group_version_and_kind() {
        let query = AuditLogQuery::answered(QuerySpec::default(), AuditLogQueryStatus::default());
        assert_eq!(query.kind, "AuditLogQuery");
        assert_eq!(query.api_version, "activity.miloapis.com/v1alpha1");
    }
}
