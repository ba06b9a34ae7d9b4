//! Fixed identifier schemas, one per filterable resource kind.
//!
//! Each schema maps the dotted paths the filter language accepts to a value
//! type and, for store-backed kinds, the columnar-store column the path
//! reads from. Rule schemas (policy match/summary environments) carry no
//! columns; they only evaluate in memory.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Timestamp,
    Bool,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Timestamp => "timestamp",
            FieldType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub path: &'static str,
    pub ty: FieldType,
    /// Columnar-store column; empty for evaluation-only schemas.
    pub column: &'static str,
}

const fn field(path: &'static str, ty: FieldType, column: &'static str) -> FieldDef {
    FieldDef { path, ty, column }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    /// Bumped when field definitions change; part of the compile cache key.
    pub version: u32,
    fields: &'static [FieldDef],
}

impl Schema {
    pub fn field(&self, path: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }
}

const AUDIT_FIELDS: &[FieldDef] = &[
    field("verb", FieldType::String, "verb"),
    field("auditID", FieldType::String, "audit_id"),
    field("requestReceivedTimestamp", FieldType::Timestamp, "request_received_timestamp"),
    field("objectRef.namespace", FieldType::String, "object_namespace"),
    field("objectRef.resource", FieldType::String, "object_resource"),
    field("objectRef.name", FieldType::String, "object_name"),
    field("objectRef.apiGroup", FieldType::String, "object_api_group"),
    field("user.username", FieldType::String, "user_username"),
    field("user.uid", FieldType::String, "user_uid"),
    field("responseStatus.code", FieldType::Int, "response_code"),
];

const EVENT_FIELDS: &[FieldDef] = &[
    field("reason", FieldType::String, "reason"),
    field("type", FieldType::String, "event_type"),
    field("message", FieldType::String, "message"),
    field("reportingComponent", FieldType::String, "reporting_component"),
    field("timestamp", FieldType::Timestamp, "timestamp"),
    field("involvedObject.apiGroup", FieldType::String, "involved_api_group"),
    field("involvedObject.kind", FieldType::String, "involved_kind"),
    field("involvedObject.namespace", FieldType::String, "involved_namespace"),
    field("involvedObject.name", FieldType::String, "involved_name"),
    field("involvedObject.uid", FieldType::String, "involved_uid"),
];

const ACTIVITY_FIELDS: &[FieldDef] = &[
    field("summary", FieldType::String, "summary"),
    field("changeSource", FieldType::String, "change_source"),
    field("actor.type", FieldType::String, "actor_type"),
    field("actor.name", FieldType::String, "actor_name"),
    field("actor.uid", FieldType::String, "actor_uid"),
    field("resource.apiGroup", FieldType::String, "resource_api_group"),
    field("resource.kind", FieldType::String, "resource_kind"),
    field("resource.namespace", FieldType::String, "resource_namespace"),
    field("resource.name", FieldType::String, "resource_name"),
    field("resource.uid", FieldType::String, "resource_uid"),
    field("origin.type", FieldType::String, "origin_type"),
    field("origin.id", FieldType::String, "origin_id"),
    field("startTime", FieldType::Timestamp, "start_time"),
];

/// Policy audit-rule environment: the raw record under `audit.` plus the
/// derived helpers. Referencing `event.` here is an unknown-field binding
/// error, which is exactly how cross-binding use is rejected at admission.
const RULE_AUDIT_FIELDS: &[FieldDef] = &[
    field("audit.verb", FieldType::String, ""),
    field("audit.auditID", FieldType::String, ""),
    field("audit.requestReceivedTimestamp", FieldType::Timestamp, ""),
    field("audit.objectRef.namespace", FieldType::String, ""),
    field("audit.objectRef.resource", FieldType::String, ""),
    field("audit.objectRef.name", FieldType::String, ""),
    field("audit.objectRef.apiGroup", FieldType::String, ""),
    field("audit.user.username", FieldType::String, ""),
    field("audit.user.uid", FieldType::String, ""),
    field("audit.responseStatus.code", FieldType::Int, ""),
    field("actor", FieldType::String, ""),
    field("verb", FieldType::String, ""),
    field("kind", FieldType::String, ""),
];

/// Policy event-rule environment.
const RULE_EVENT_FIELDS: &[FieldDef] = &[
    field("event.reason", FieldType::String, ""),
    field("event.type", FieldType::String, ""),
    field("event.message", FieldType::String, ""),
    field("event.reportingComponent", FieldType::String, ""),
    field("event.involvedObject.apiGroup", FieldType::String, ""),
    field("event.involvedObject.kind", FieldType::String, ""),
    field("event.involvedObject.namespace", FieldType::String, ""),
    field("event.involvedObject.name", FieldType::String, ""),
    field("event.involvedObject.uid", FieldType::String, ""),
    field("actor", FieldType::String, ""),
    field("reason", FieldType::String, ""),
    field("kind", FieldType::String, ""),
];

static AUDIT: Schema = Schema {
    name: "audit",
    version: 1,
    fields: AUDIT_FIELDS,
};

static EVENT: Schema = Schema {
    name: "event",
    version: 1,
    fields: EVENT_FIELDS,
};

static ACTIVITY: Schema = Schema {
    name: "activity",
    version: 1,
    fields: ACTIVITY_FIELDS,
};

static RULE_AUDIT: Schema = Schema {
    name: "rule-audit",
    version: 1,
    fields: RULE_AUDIT_FIELDS,
};

static RULE_EVENT: Schema = Schema {
    name: "rule-event",
    version: 1,
    fields: RULE_EVENT_FIELDS,
};

pub fn audit() -> &'static Schema {
    &AUDIT
}

pub fn event() -> &'static Schema {
    &EVENT
}

pub fn activity() -> &'static Schema {
    &ACTIVITY
}

pub fn rule_audit() -> &'static Schema {
    &RULE_AUDIT
}

pub fn rule_event() -> &'static Schema {
    &RULE_EVENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_schema_covers_documented_identifiers() {
        for path in [
            "verb",
            "auditID",
            "requestReceivedTimestamp",
            "objectRef.namespace",
            "objectRef.resource",
            "objectRef.name",
            "objectRef.apiGroup",
            "user.username",
            "user.uid",
            "responseStatus.code",
        ] {
            assert!(audit().field(path).is_some(), "missing {}", path);
        }
        assert_eq!(audit().field("responseStatus.code").unwrap().ty, FieldType::Int);
    }

    #[test]
    fn rule_schemas_do_not_cross_bindings() {
        assert!(rule_audit().field("event.reason").is_none());
        assert!(rule_event().field("audit.verb").is_none());
    }
}
