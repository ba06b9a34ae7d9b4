//! Translated, human-facing activity records.

use crate::meta::ObjectMeta;
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Who performed the change, after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    ServiceAccount,
    Controller,
    Unknown,
}

/// Whether the change came from an interactive human identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    Human,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub uid: String,
}

/// The resource an activity is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
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

/// A named link from an activity to another resource, extracted while
/// rendering the summary template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLink {
    pub name: String,
    pub target: String,
}

/// Which kind of raw record the activity was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OriginType {
    Audit,
    Event,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Audit => "audit",
            OriginType::Event => "event",
        }
    }
}

/// Provenance of an activity: the raw record it was translated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(rename = "type")]
    pub origin_type: OriginType,
    /// Stable ID of the source record.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySpec {
    /// Rendered summary template.
    pub summary: String,
    pub change_source: ChangeSource,
    pub actor: Actor,
    pub resource: ResourceRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ActivityLink>,
    pub scope: Scope,
    pub origin: Origin,
    #[schema(value_type = String, format = "date-time")]
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub end_time: Option<DateTime<Utc>>,
}

/// An immutable, policy-translated record derived from one raw audit or
/// event record. `metadata.resource_version` is the message-log sequence
/// number assigned at publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ActivitySpec,
}

impl Activity {
    /// Message-log sequence parsed back out of `resourceVersion`.
    pub fn sequence(&self) -> Option<u64> {
        self.metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
    }
}
