//! Health and metrics endpoints.

use crate::state::AppState;
use activity_core::health::{ComponentCheck, HealthCheck, HealthStatus};
use actix_web::{web, HttpResponse, Result as ActixResult};
use message_log::MessageLog;
use prometheus::{Encoder, TextEncoder};

/// Service health
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Health document", body = HealthCheck)),
    tag = "system"
)]
pub async fn healthz(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let store_check = match sqlx::query("SELECT 1").execute(state.store.pool()).await {
        Ok(_) => ComponentCheck {
            name: "columnar-store".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => ComponentCheck {
            name: "columnar-store".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };
    let log_check = match state.log.last_sequence().await {
        Ok(_) => ComponentCheck {
            name: "message-log".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => ComponentCheck {
            name: "message-log".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };

    let health = HealthCheck::with_checks(
        env!("CARGO_PKG_VERSION"),
        vec![store_check, log_check],
    );
    Ok(HttpResponse::Ok().json(health))
}

/// Prometheus metrics
pub async fn metrics(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let encoder = TextEncoder::new();
    let families = state.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        log::error!("metrics encoding failed: {}", e);
        return Ok(HttpResponse::InternalServerError().finish());
    }
    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}
