//! Error-to-HTTP mapping.

use activity_core::ActivityError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

/// Render the service error taxonomy as a Kubernetes-style Status document
/// with the matching HTTP code. Backend causes were already reduced to a
/// generic message upstream; nothing internal leaks here.
pub fn error_response(err: &ActivityError) -> HttpResponse {
    let code = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "code": err.status_code(),
        "reason": err.reason(),
        "message": err.to_string(),
    });
    if let ActivityError::RateLimited { retry_after_seconds } = err {
        body["details"] = json!({ "retryAfterSeconds": retry_after_seconds });
    }
    HttpResponse::build(code).json(body)
}
