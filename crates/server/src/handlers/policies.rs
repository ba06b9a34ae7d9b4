//! `activitypolicies` resource: full CRUD plus the status sub-endpoint.

use crate::error::error_response;
use crate::handlers::api_version;
use crate::identity::caller_from_request;
use crate::state::AppState;
use activity_core::{ActivityError, ActivityPolicy, ActivityPolicySpec};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use policy_engine::reconcile_status;
use serde_json::{json, Value};

fn with_type_meta(mut value: Value) -> Value {
    value["apiVersion"] = json!(api_version());
    value["kind"] = json!("ActivityPolicy");
    value
}

fn policy_json(policy: &ActivityPolicy) -> Value {
    with_type_meta(serde_json::to_value(policy).unwrap_or_default())
}

/// Create a policy
#[utoipa::path(
    post,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies",
    request_body = ActivityPolicy,
    responses(
        (status = 201, description = "Policy admitted", body = ActivityPolicy),
        (status = 422, description = "Rules failed validation or compilation")
    ),
    tag = "policies"
)]
pub async fn create_policy(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ActivityPolicy>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let policy = body.into_inner();
    match state.policy_store.create(policy, &state.filter_cache).await {
        Ok(created) => {
            // Admission compiled the rules; move the status machine off
            // Pending and rotate the evaluator snapshot.
            let status = reconcile_status(&created, &state.filter_cache);
            let reconciled = state
                .policy_store
                .update_status(&created.metadata.name, status)
                .await
                .unwrap_or(created);
            state.refresh_policies().await;
            Ok(HttpResponse::Created().json(policy_json(&reconciled)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// List policies
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies",
    responses((status = 200, description = "Policy list")),
    tag = "policies"
)]
pub async fn list_policies(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    match state.policy_store.list().await {
        Ok(policies) => Ok(HttpResponse::Ok().json(json!({
            "apiVersion": api_version(),
            "kind": "ActivityPolicyList",
            "items": policies,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Get a policy
#[utoipa::path(
    get,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies/{name}",
    params(("name" = String, Path, description = "Policy name")),
    responses(
        (status = 200, description = "The policy", body = ActivityPolicy),
        (status = 404, description = "Not found")
    ),
    tag = "policies"
)]
pub async fn get_policy(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    match state.policy_store.get(&path.into_inner()).await {
        Ok(policy) => Ok(HttpResponse::Ok().json(policy_json(&policy))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Replace a policy spec
#[utoipa::path(
    put,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies/{name}",
    params(("name" = String, Path, description = "Policy name")),
    request_body = ActivityPolicy,
    responses(
        (status = 200, description = "Policy updated", body = ActivityPolicy),
        (status = 404, description = "Not found"),
        (status = 422, description = "Target changed or rules failed compilation")
    ),
    tag = "policies"
)]
pub async fn update_policy(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<ActivityPolicy>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let name = path.into_inner();
    apply_spec(&state, &name, body.into_inner().spec).await
}

/// Merge-patch a policy spec
#[utoipa::path(
    patch,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies/{name}",
    params(("name" = String, Path, description = "Policy name")),
    responses(
        (status = 200, description = "Policy patched", body = ActivityPolicy),
        (status = 404, description = "Not found"),
        (status = 422, description = "Patched spec is invalid")
    ),
    tag = "policies"
)]
pub async fn patch_policy(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let name = path.into_inner();
    let existing = match state.policy_store.get(&name).await {
        Ok(existing) => existing,
        Err(e) => return Ok(error_response(&e)),
    };

    let patch = body.into_inner();
    let mut spec_value = match serde_json::to_value(&existing.spec) {
        Ok(value) => value,
        Err(e) => return Ok(error_response(&ActivityError::from(e))),
    };
    if let Some(spec_patch) = patch.get("spec") {
        merge_patch(&mut spec_value, spec_patch);
    }
    let spec: ActivityPolicySpec = match serde_json::from_value(spec_value) {
        Ok(spec) => spec,
        Err(e) => {
            return Ok(error_response(&ActivityError::invalid(
                "spec",
                format!("patched spec does not parse: {}", e),
            )))
        }
    };
    apply_spec(&state, &name, spec).await
}

/// Delete a policy
#[utoipa::path(
    delete,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies/{name}",
    params(("name" = String, Path, description = "Policy name")),
    responses(
        (status = 200, description = "Policy deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "policies"
)]
pub async fn delete_policy(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let name = path.into_inner();
    match state.policy_store.delete(&name).await {
        Ok(()) => {
            state.refresh_policies().await;
            Ok(HttpResponse::Ok().json(json!({
                "kind": "Status",
                "status": "Success",
                "code": 200,
            })))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// Write the policy status sub-resource
#[utoipa::path(
    put,
    path = "/apis/activity.miloapis.com/v1alpha1/activitypolicies/{name}/status",
    params(("name" = String, Path, description = "Policy name")),
    request_body = ActivityPolicy,
    responses(
        (status = 200, description = "Status updated", body = ActivityPolicy),
        (status = 404, description = "Not found")
    ),
    tag = "policies"
)]
pub async fn update_policy_status(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<ActivityPolicy>,
) -> ActixResult<HttpResponse> {
    if let Err(e) = caller_from_request(&req) {
        return Ok(error_response(&e));
    }
    let name = path.into_inner();
    match state
        .policy_store
        .update_status(&name, body.into_inner().status)
        .await
    {
        Ok(policy) => Ok(HttpResponse::Ok().json(policy_json(&policy))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn apply_spec(
    state: &AppState,
    name: &str,
    spec: ActivityPolicySpec,
) -> ActixResult<HttpResponse> {
    match state.policy_store.update(name, spec, &state.filter_cache).await {
        Ok(updated) => {
            let status = reconcile_status(&updated, &state.filter_cache);
            let reconciled = state
                .policy_store
                .update_status(name, status)
                .await
                .unwrap_or(updated);
            state.refresh_policies().await;
            Ok(HttpResponse::Ok().json(policy_json(&reconciled)))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

/// RFC 7386 merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(entries) => {
            if !target.is_object() {
                *target = json!({});
            }
            let map = target.as_object_mut().unwrap();
            for (key, value) in entries {
                if value.is_null() {
                    map.remove(key);
                } else {
                    merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_patch_replaces_and_removes() {
        let mut target = json!({
            "target": {"apiGroup": "apps", "kind": "Deployment"},
            "auditRules": [{"match": "a", "summary": "b"}]
        });
        merge_patch(
            &mut target,
            &json!({"auditRules": [{"match": "x", "summary": "y"}]}),
        );
        assert_eq!(target["auditRules"][0]["match"], "x");
        assert_eq!(target["target"]["kind"], "Deployment");

        merge_patch(&mut target, &json!({"target": {"apiGroup": null}}));
        assert!(target["target"].get("apiGroup").is_none());
    }
}
