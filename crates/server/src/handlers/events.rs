//! `events` resource: list, get, watch, create.

use crate::error::error_response;
use crate::handlers::{api_version, watch_response, ListQuery};
use crate::identity::caller_from_request;
use crate::state::AppState;
use activity_core::{
    ActivityError, EventRecord, EventType, InvolvedObject, Scope,
};
use activity_storage::{IngestEvent, RecordKind, RunQuery};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use chrono::Utc;
use message_log::{subject, MessageLog};
use query_engine::ListParams;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use watch_engine::{WatchParams, WatchResource};

/// List or watch events across namespaces
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/events",
    responses(
        (status = 200, description = "Event list or watch stream"),
        (status = 422, description = "Invalid parameters")
    ),
    tag = "events"
)]
pub async fn list_events(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> ActixResult<HttpResponse> {
    list_or_watch(&state, &req, query.into_inner(), None).await
}

/// List or watch events in one namespace
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/namespaces/{namespace}/events",
    params(("namespace" = String, Path, description = "Namespace")),
    responses(
        (status = 200, description = "Event list or watch stream"),
        (status = 422, description = "Invalid parameters")
    ),
    tag = "events"
)]
pub async fn list_events_namespaced(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> ActixResult<HttpResponse> {
    let namespace = path.into_inner();
    list_or_watch(&state, &req, query.into_inner(), Some(namespace)).await
}

async fn list_or_watch(
    state: &AppState,
    req: &HttpRequest,
    query: ListQuery,
    namespace: Option<String>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };

    if query.is_watch() {
        let params = WatchParams {
            resource_version: query.resource_version.clone(),
            field_selector: query.field_selector.clone(),
            filter: query.filter.clone(),
            namespace,
        };
        return match state.watch.watch(WatchResource::Events, &caller, params).await {
            Ok(rx) => Ok(watch_response(rx)),
            Err(e) => Ok(error_response(&e)),
        };
    }

    let params = ListParams {
        field_selector: query.selector_with_namespace(namespace.as_deref()),
        limit: query.limit,
        continue_token: query.continue_token.clone(),
    };
    let store: &dyn RunQuery<EventRecord> = state.store.as_ref();
    match state
        .engine
        .run_list(RecordKind::Event, "events", store, &caller, &params)
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "apiVersion": api_version(),
            "kind": "EventList",
            "metadata": { "continue": page.continue_token },
            "items": page.items,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Get one event
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/namespaces/{namespace}/events/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("name" = String, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "The event", body = EventRecord),
        (status = 404, description = "Not found or out of scope")
    ),
    tag = "events"
)]
pub async fn get_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(&req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };
    let (namespace, name) = path.into_inner();
    match state
        .engine
        .get_event(state.store.as_ref(), &caller, &namespace, &name)
        .await
    {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Event creation body; the server assigns the id, timestamp and tenant
/// scope.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub involved_object: InvolvedObject,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    #[serde(default)]
    pub reporting_component: String,
    #[serde(default)]
    pub message: String,
}

/// Record an event
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/namespaces/{namespace}/events",
    params(("namespace" = String, Path, description = "Namespace")),
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = EventRecord),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "events"
)]
pub async fn create_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<CreateEventRequest>,
) -> ActixResult<HttpResponse> {
    let caller = match caller_from_request(&req) {
        Ok(caller) => caller,
        Err(e) => return Ok(error_response(&e)),
    };
    let scope = Scope::resolve(&caller);
    if let Err(e) = state.rate_limiter.check(&scope) {
        return Ok(error_response(&e));
    }

    let request = body.into_inner();
    let mut involved_object = request.involved_object;
    if involved_object.namespace.is_empty() {
        involved_object.namespace = path.into_inner();
    }
    let record = EventRecord {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        scope: scope.clone(),
        involved_object,
        reason: request.reason,
        event_type: request.event_type,
        reporting_component: request.reporting_component,
        message: request.message,
        payload: serde_json::Value::Null,
    };

    let stored = match state.store.ingest_event(&record).await {
        Ok(stored) => stored,
        Err(e) => {
            log::error!("event ingest failed: {}", e);
            return Ok(error_response(&ActivityError::from(e)));
        }
    };
    if stored {
        let subject_name = subject::event_subject(&record.scope, &record.involved_object);
        let payload = match serde_json::to_value(&record) {
            Ok(payload) => payload,
            Err(e) => return Ok(error_response(&ActivityError::from(e))),
        };
        if let Err(e) = state.log.publish(&subject_name, payload).await {
            // The record is persisted; the stream is best-effort here.
            log::error!("event publish to {} failed: {}", subject_name, e);
        }
    }

    Ok(HttpResponse::Created().json(record))
}
