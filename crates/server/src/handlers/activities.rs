//! `activities` resource: list, get, watch.

use crate::error::error_response;
use crate::handlers::{api_version, watch_response, ListQuery};
use crate::identity::caller_from_request;
use crate::state::AppState;
use activity_core::Activity;
use activity_storage::{RecordKind, RunQuery};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use query_engine::ListParams;
use serde_json::json;
use watch_engine::{WatchParams, WatchResource};

/// List or watch activities across namespaces
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/activities",
    responses(
        (status = 200, description = "Activity list or watch stream"),
        (status = 410, description = "Stale resourceVersion on watch"),
        (status = 422, description = "Invalid parameters")
    ),
    tag = "activities"
)]
pub async fn list_activities(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> ActixResult<HttpResponse> {
    list_or_watch(&state, &req, query.into_inner(), None).await
}

/// List or watch activities in one namespace
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/namespaces/{namespace}/activities",
    params(("namespace" = String, Path, description = "Namespace")),
    responses(
        (status = 200, description = "Activity list or watch stream"),
        (status = 422, description = "Invalid parameters")
    ),
    tag = "activities"
)]
pub async fn list_activities_namespaced(
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
        return match state
            .watch
            .watch(WatchResource::Activities, &caller, params)
            .await
        {
            Ok(rx) => Ok(watch_response(rx)),
            Err(e) => Ok(error_response(&e)),
        };
    }

    let params = ListParams {
        field_selector: query.selector_with_namespace(namespace.as_deref()),
        limit: query.limit,
        continue_token: query.continue_token.clone(),
    };
    let store: &dyn RunQuery<Activity> = state.store.as_ref();
    match state
        .engine
        .run_list(RecordKind::Activity, "activities", store, &caller, &params)
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "apiVersion": api_version(),
            "kind": "ActivityList",
            "metadata": { "continue": page.continue_token },
            "items": page.items,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Get one activity
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/namespaces/{namespace}/activities/{name}",
    params(
        ("namespace" = String, Path, description = "Namespace"),
        ("name" = String, Path, description = "Activity name")
    ),
    responses(
        (status = 200, description = "The activity", body = Activity),
        (status = 404, description = "Not found or out of scope")
    ),
    tag = "activities"
)]
pub async fn get_activity(
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
        .get_activity(state.store.as_ref(), &caller, &namespace, &name)
        .await
    {
        Ok(activity) => Ok(HttpResponse::Ok().json(activity)),
        Err(e) => Ok(error_response(&e)),
    }
}
