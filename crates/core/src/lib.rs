//! Shared domain model for the activity service.
//!
//! Holds the record/activity/policy entities, the tenant scope model, the
//! service-wide error taxonomy, caller identity, and the typed runtime
//! configuration. Everything wire-facing serializes in the
//! `activity.miloapis.com/v1alpha1` shape.

pub mod activity;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod meta;
pub mod policy;
pub mod records;
pub mod scope;
pub mod time;

pub use activity::{
    Activity, ActivityLink, ActivitySpec, Actor, ActorType, ChangeSource, Origin, OriginType,
    ResourceRef,
};
pub use config::Config;
pub use error::{ActivityError, ActivityResult};
pub use identity::CallerIdentity;
pub use meta::{ListMeta, ObjectMeta};
pub use policy::{
    ActivityPolicy, ActivityPolicySpec, ActivityPolicyStatus, PolicyPhase, PolicyRule,
    PolicyTarget, RuleDiagnostic,
};
pub use records::{
    AuditRecord, AuditUser, EventRecord, EventType, InvolvedObject, ObjectReference,
    ResponseStatus,
};
pub use scope::{Scope, ScopeType};
pub use time::ResolvedTime;

/// API group served by this system.
pub const API_GROUP: &str = "activity.miloapis.com";

/// API version served by this system.
pub const API_VERSION: &str = "v1alpha1";
