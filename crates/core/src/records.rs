//! Raw audit and event records as persisted in the columnar store.
//!
//! Both carry the full original payload plus the indexed attributes the
//! filter language and facet engine operate on.

use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reference to the resource a control-plane operation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub api_group: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// The acting user as recorded on an audit record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditUser {
    pub username: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    #[serde(default)]
    pub code: i32,
}

/// A completed control-plane operation.
///
/// `audit_id` is globally unique; ingestion dedupes on it within a ten
/// minute window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(rename = "auditID")]
    pub audit_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub request_received_timestamp: DateTime<Utc>,
    pub scope: Scope,
    pub verb: String,
    pub user: AuditUser,
    #[serde(default)]
    pub object_ref: ObjectReference,
    #[serde(default)]
    pub response_status: ResponseStatus,
    /// The full original record, untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Severity of a Kubernetes-style event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EventType {
    Normal,
    Warning,
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Normal
    }
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    #[serde(default)]
    pub api_group: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

/// A Kubernetes-style event about an observed object, annotated with the
/// same tenant scope as audit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub scope: Scope,
    pub involved_object: InvolvedObject,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub reporting_component: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeType;
    use chrono::TimeZone;

    #[test]
    fn audit_record_wire_shape() {
        let record = AuditRecord {
            audit_id: "a-1".into(),
            request_received_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
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
            payload: serde_json::Value::Null,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["auditID"], "a-1");
        assert_eq!(json["objectRef"]["apiGroup"], "apps");
        assert_eq!(json["responseStatus"]["code"], 201);
        let back: AuditRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn event_type_serializes_capitalized() {
        let json = serde_json::to_value(EventType::Warning).unwrap();
        assert_eq!(json, "Warning");
    }
}
