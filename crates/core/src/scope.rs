//! Tenant scope model and resolution from caller identity.

use crate::identity::{CallerIdentity, EXTRA_PARENT_NAME, EXTRA_PARENT_TYPE};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tenant perimeter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    /// Unscoped; sees everything. The empty-name scope for admin identities.
    Platform,
    Organization,
    Project,
    /// Scoped to one actor; filters on the actor's stable UID.
    User,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Platform => "platform",
            ScopeType::Organization => "organization",
            ScopeType::Project => "project",
            ScopeType::User => "user",
        }
    }
}

/// A `(type, name)` tenant perimeter, used for both query filtering and
/// message-log subject routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    #[serde(default)]
    pub name: String,
}

impl Scope {
    pub fn new(scope_type: ScopeType, name: impl Into<String>) -> Self {
        Self {
            scope_type,
            name: name.into(),
        }
    }

    /// The unscoped platform perimeter.
    pub fn platform() -> Self {
        Self {
            scope_type: ScopeType::Platform,
            name: String::new(),
        }
    }

    pub fn is_platform(&self) -> bool {
        self.scope_type == ScopeType::Platform
    }

    /// Derive the tenant scope from the caller's identity extras.
    ///
    /// Absent or empty extras resolve to platform scope, as do parent types
    /// this service does not know about (admin identities carry none).
    pub fn resolve(identity: &CallerIdentity) -> Scope {
        let parent_type = identity.extra(EXTRA_PARENT_TYPE).unwrap_or_default();
        let parent_name = identity.extra(EXTRA_PARENT_NAME).unwrap_or_default();
        if parent_type.is_empty() || parent_name.is_empty() {
            return Scope::platform();
        }
        match parent_type {
            "Organization" => Scope::new(ScopeType::Organization, parent_name),
            "Project" => Scope::new(ScopeType::Project, parent_name),
            "User" => Scope::new(ScopeType::User, parent_name),
            _ => Scope::platform(),
        }
    }
}
