//! Activity service entry point.

use activity_core::Config;
use activity_server::docs::ApiDoc;
use activity_server::handlers::{activities, events, health, policies, queries};
use activity_server::{AppState, API_BASE};
use activity_storage::{IngestActivity, PostgresStore};
use actix_web::{middleware::Logger, web, App, HttpServer};
use message_log::InMemoryLog;
use policy_engine::Processor;
use std::sync::Arc;
use tokio::sync::watch;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logger();
    let config = Config::from_env();
    let http_addr = config.http_addr.clone();

    let store = PostgresStore::connect(&config.store_dsn)
        .await
        .map_err(|e| std::io::Error::other(format!("store connect failed: {}", e)))?;
    let store = Arc::new(store);

    // In-process log backend; production deployments point this at the
    // managed message log.
    let message_log = Arc::new(InMemoryLog::new());

    let state = AppState::new(config, Arc::clone(&store), Arc::clone(&message_log));
    state
        .policy_store
        .ensure_schema()
        .await
        .map_err(|e| std::io::Error::other(format!("policy schema failed: {}", e)))?;
    state.refresh_policies().await;

    // The translation processor runs beside the API server: one durable
    // subscription per record family.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sink: Arc<dyn IngestActivity> = Arc::clone(&store) as Arc<dyn IngestActivity>;
    let processor = Arc::new(Processor::new(
        Arc::clone(&message_log),
        sink,
        Arc::clone(&state.policy_set),
        Arc::clone(&state.translator),
    ));
    {
        let processor = Arc::clone(&processor);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = processor.run_audit(shutdown).await {
                log::error!("audit processor stopped: {}", e);
            }
        });
    }
    {
        let processor = Arc::clone(&processor);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = processor.run_events(shutdown).await {
                log::error!("event processor stopped: {}", e);
            }
        });
    }

    let data = web::Data::new(state);
    log::info!("activity service listening on {}", http_addr);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .route("/healthz", web::get().to(health::healthz))
            .route("/metrics", web::get().to(health::metrics))
            .service(
                web::scope(API_BASE)
                    .route(
                        "/auditlogqueries",
                        web::post().to(queries::create_audit_log_query),
                    )
                    .route(
                        "/activityqueries",
                        web::post().to(queries::create_activity_query),
                    )
                    .route("/eventqueries", web::post().to(queries::create_event_query))
                    .route(
                        "/auditlogfacetsqueries",
                        web::post().to(queries::create_audit_facets_query),
                    )
                    .route(
                        "/activityfacetqueries",
                        web::post().to(queries::create_activity_facets_query),
                    )
                    .route(
                        "/eventfacetqueries",
                        web::post().to(queries::create_event_facets_query),
                    )
                    .route(
                        "/policypreviews",
                        web::post().to(queries::create_policy_preview),
                    )
                    .route("/activities", web::get().to(activities::list_activities))
                    .route(
                        "/namespaces/{namespace}/activities",
                        web::get().to(activities::list_activities_namespaced),
                    )
                    .route(
                        "/namespaces/{namespace}/activities/{name}",
                        web::get().to(activities::get_activity),
                    )
                    .route("/events", web::get().to(events::list_events))
                    .route(
                        "/namespaces/{namespace}/events",
                        web::get().to(events::list_events_namespaced),
                    )
                    .route(
                        "/namespaces/{namespace}/events",
                        web::post().to(events::create_event),
                    )
                    .route(
                        "/namespaces/{namespace}/events/{name}",
                        web::get().to(events::get_event),
                    )
                    .route(
                        "/activitypolicies",
                        web::post().to(policies::create_policy),
                    )
                    .route("/activitypolicies", web::get().to(policies::list_policies))
                    .route(
                        "/activitypolicies/{name}",
                        web::get().to(policies::get_policy),
                    )
                    .route(
                        "/activitypolicies/{name}",
                        web::put().to(policies::update_policy),
                    )
                    .route(
                        "/activitypolicies/{name}",
                        web::patch().to(policies::patch_policy),
                    )
                    .route(
                        "/activitypolicies/{name}",
                        web::delete().to(policies::delete_policy),
                    )
                    .route(
                        "/activitypolicies/{name}/status",
                        web::put().to(policies::update_policy_status),
                    ),
            )
    })
    .bind(&http_addr)?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    server
}
