//! OpenAPI document served through Swagger UI.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::queries::create_audit_log_query,
        crate::handlers::queries::create_activity_query,
        crate::handlers::queries::create_event_query,
        crate::handlers::queries::create_audit_facets_query,
        crate::handlers::queries::create_activity_facets_query,
        crate::handlers::queries::create_event_facets_query,
        crate::handlers::queries::create_policy_preview,
        crate::handlers::activities::list_activities,
        crate::handlers::activities::list_activities_namespaced,
        crate::handlers::activities::get_activity,
        crate::handlers::events::list_events,
        crate::handlers::events::list_events_namespaced,
        crate::handlers::events::get_event,
        crate::handlers::events::create_event,
        crate::handlers::policies::create_policy,
        crate::handlers::policies::list_policies,
        crate::handlers::policies::get_policy,
        crate::handlers::policies::update_policy,
        crate::handlers::policies::patch_policy,
        crate::handlers::policies::delete_policy,
        crate::handlers::policies::update_policy_status,
        crate::handlers::health::healthz,
    ),
    components(schemas(
        activity_core::Activity,
        activity_core::activity::ActivitySpec,
        activity_core::activity::Actor,
        activity_core::activity::ActorType,
        activity_core::activity::ChangeSource,
        activity_core::activity::ActivityLink,
        activity_core::activity::Origin,
        activity_core::activity::OriginType,
        activity_core::activity::ResourceRef,
        activity_core::meta::ObjectMeta,
        activity_core::meta::ListMeta,
        activity_core::scope::Scope,
        activity_core::scope::ScopeType,
        activity_core::records::AuditRecord,
        activity_core::records::AuditUser,
        activity_core::records::ObjectReference,
        activity_core::records::ResponseStatus,
        activity_core::records::EventRecord,
        activity_core::records::EventType,
        activity_core::records::InvolvedObject,
        activity_core::policy::ActivityPolicy,
        activity_core::policy::ActivityPolicySpec,
        activity_core::policy::ActivityPolicyStatus,
        activity_core::policy::PolicyPhase,
        activity_core::policy::PolicyRule,
        activity_core::policy::PolicyTarget,
        activity_core::policy::RuleDiagnostic,
        activity_core::health::HealthCheck,
        activity_core::health::HealthStatus,
        activity_core::health::ComponentCheck,
        query_engine::QuerySpec,
        query_engine::AuditLogQuery,
        query_engine::AuditLogQueryStatus,
        query_engine::ActivityQuery,
        query_engine::ActivityQueryStatus,
        query_engine::EventQuery,
        query_engine::EventQueryStatus,
        query_engine::FacetQuerySpec,
        query_engine::FacetRequest,
        query_engine::FacetValueCount,
        query_engine::FacetQueryStatus,
        query_engine::facets::FacetResult,
        policy_engine::PolicyPreview,
        policy_engine::PolicyPreviewSpec,
        policy_engine::PolicyPreviewStatus,
        policy_engine::PreviewResult,
        crate::handlers::events::CreateEventRequest,
        watch_engine::WatchEvent,
        watch_engine::WatchEventType,
    )),
    tags(
        (name = "queries", description = "Ephemeral query resources"),
        (name = "activities", description = "Translated activity records"),
        (name = "events", description = "Observed events"),
        (name = "policies", description = "Activity translation policies"),
        (name = "system", description = "Health and metrics")
    ),
    info(
        title = "Activity Service API",
        description = "Multi-tenant activity and audit APIs under activity.miloapis.com/v1alpha1"
    )
)]
pub struct ApiDoc;
