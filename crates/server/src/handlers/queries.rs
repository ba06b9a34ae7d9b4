//! Ephemeral query resources: create executes in-band and persists nothing.

use crate::error::error_response;
use crate::handlers::api_version;
use crate::identity::caller_from_request;
use crate::state::AppState;
use activity_core::{Activity, AuditRecord, EventRecord};
use activity_storage::{RecordKind, RunQuery};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use policy_engine::{run_preview, PolicyPreview};
use query_engine::{
    ActivityQuery, ActivityQueryStatus, AuditLogQuery, AuditLogQueryStatus, EventQuery,
    EventQueryStatus, FacetQuerySpec, FacetQueryStatus,
};
use serde::Deserialize;

/// Execute an audit log query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/auditlogqueries",
    request_body = AuditLogQuery,
    responses(
        (status = 201, description = "Query executed, results inline", body = AuditLogQuery),
        (status = 422, description = "Invalid query spec"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "queries"
)]
pub async fn create_audit_log_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AuditLogQuery>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(&req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };
    let query = body.into_inner();
    let store: &dyn RunQuery<AuditRecord> = state.store.as_ref();
    match state
        .engine
        .run_query(RecordKind::Audit, "auditlogqueries", store, &caller, &query.spec)
        .await
    {
        Ok(page) => {
            let status = AuditLogQueryStatus {
                results: page.items,
                continue_token: page.continue_token,
                effective_start_time: Some(page.effective_start_time),
                effective_end_time: Some(page.effective_end_time),
            };
            Ok(HttpResponse::Created().json(AuditLogQuery::answered(query.spec, status)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// Execute an activity query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/activityqueries",
    request_body = ActivityQuery,
    responses(
        (status = 201, description = "Query executed, results inline", body = ActivityQuery),
        (status = 422, description = "Invalid query spec")
    ),
    tag = "queries"
)]
pub async fn create_activity_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ActivityQuery>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(&req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };
    let query = body.into_inner();
    let store: &dyn RunQuery<Activity> = state.store.as_ref();
    match state
        .engine
        .run_query(RecordKind::Activity, "activityqueries", store, &caller, &query.spec)
        .await
    {
        Ok(page) => {
            let status = ActivityQueryStatus {
                results: page.items,
                continue_token: page.continue_token,
                effective_start_time: Some(page.effective_start_time),
                effective_end_time: Some(page.effective_end_time),
            };
            Ok(HttpResponse::Created().json(ActivityQuery::answered(query.spec, status)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// Execute an event query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/eventqueries",
    request_body = EventQuery,
    responses(
        (status = 201, description = "Query executed, results inline", body = EventQuery),
        (status = 422, description = "Invalid query spec")
    ),
    tag = "queries"
)]
pub async fn create_event_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<EventQuery>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(&req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };
    let query = body.into_inner();
    let store: &dyn RunQuery<EventRecord> = state.store.as_ref();
    match state
        .engine
        .run_query(RecordKind::Event, "eventqueries", store, &caller, &query.spec)
        .await
    {
        Ok(page) => {
            let status = EventQueryStatus {
                results: page.items,
                continue_token: page.continue_token,
                effective_start_time: Some(page.effective_start_time),
                effective_end_time: Some(page.effective_end_time),
            };
            Ok(HttpResponse::Created().json(EventQuery::answered(query.spec, status)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct FacetQueryCreate {
    pub spec: FacetQuerySpec,
}

async fn run_facet_query(
    state: &AppState,
    req: &HttpRequest,
    kind: RecordKind,
    resource: &'static str,
    response_kind: &str,
    spec: FacetQuerySpec,
) -> HttpResponse {
    let caller = match caller_from_request(req) {
        Ok(caller) => caller,
        Err(e) => return error_response(&e),
    };
    match state
        .engine
        .run_facets(kind, resource, state.store.as_ref(), &caller, &spec)
        .await
    {
        Ok((facets, start, end)) => {
            let status = FacetQueryStatus {
                facets,
                effective_start_time: Some(start.at),
                effective_end_time: Some(end.at),
            };
            HttpResponse::Created().json(serde_json::json!({
                "apiVersion": api_version(),
                "kind": response_kind,
                "spec": spec,
                "status": status,
            }))
        }
        Err(e) => error_response(&e),
    }
}

/// Execute an audit log facet query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/auditlogfacetsqueries",
    request_body = FacetQuerySpec,
    responses(
        (status = 201, description = "Facets computed, results inline"),
        (status = 422, description = "Invalid facet spec")
    ),
    tag = "queries"
)]
pub async fn create_audit_facets_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<FacetQueryCreate>,
) -> ActixResult<HttpResponse> {
    Ok(run_facet_query(
        &state,
        &req,
        RecordKind::Audit,
        "auditlogfacetsqueries",
        "AuditLogFacetsQuery",
        body.into_inner().spec,
    )
    .await)
}

/// Execute an activity facet query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/activityfacetqueries",
    request_body = FacetQuerySpec,
    responses(
        (status = 201, description = "Facets computed, results inline"),
        (status = 422, description = "Invalid facet spec")
    ),
    tag = "queries"
)]
pub async fn create_activity_facets_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<FacetQueryCreate>,
) -> ActixResult<HttpResponse> {
    Ok(run_facet_query(
        &state,
        &req,
        RecordKind::Activity,
        "activityfacetqueries",
        "ActivityFacetQuery",
        body.into_inner().spec,
    )
    .await)
}

/// Execute an event facet query
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/eventfacetqueries",
    request_body = FacetQuerySpec,
    responses(
        (status = 201, description = "Facets computed, results inline"),
        (status = 422, description = "Invalid facet spec")
    ),
    tag = "queries"
)]
pub async fn create_event_facets_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<FacetQueryCreate>,
) -> ActixResult<HttpResponse> {
    Ok(run_facet_query(
        &state,
        &req,
        RecordKind::Event,
        "eventfacetqueries",
        "EventFacetQuery",
        body.into_inner().spec,
    )
    .await)
}

/// Preview a policy against in-line samples
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/policypreviews",
    request_body = PolicyPreview,
    responses(
        (status = 201, description = "Preview evaluated, results inline", body = PolicyPreview),
        (status = 422, description = "Policy spec does not compile")
    ),
    tag = "policies"
)]
pub async fn create_policy_preview(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<PolicyPreview>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let mut preview = body.into_inner();
    match run_preview(&state.translator, &state.filter_cache, &preview.spec) {
        Ok(status) => {
            preview.api_version = api_version();
            preview.kind = PolicyPreview::KIND.to_string();
            preview.status = Some(status);
            Ok(HttpResponse::Created().json(preview))
        }
        Err(e) => Ok(error_response(&e)),
    }
}
