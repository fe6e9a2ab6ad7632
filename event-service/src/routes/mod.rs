use axum::{
    extract::Request,
    middleware,
    routing::{get, post, put},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{
    event_handlers::{
        cancel_event, create_event, delete_event, get_event, get_event_summary, get_events,
        update_event, update_tables,
    },
    guest_handlers::{bulk_create_guests, create_guest, delete_guest, get_guests, update_guest},
    notification_handlers::{
        create_notification, delete_notification, get_notifications, get_send_logs,
        send_notification_now, update_notification,
    },
    rsvp_handlers::{get_rsvp, submit_rsvp},
};
use eventdesk_shared::auth::auth_middleware;
use eventdesk_shared::store::{dynamo::DynamoEventStore, EventDataStore};

/// Creates a router backed by DynamoDB
pub async fn create_router() -> Router {
    info!("Creating router with DynamoDB store");

    let dynamo_store = Arc::new(DynamoEventStore::new().await);

    let remove_base_path = std::env::var("REMOVE_BASE_PATH")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    let prefix = if remove_base_path { "" } else { "/Prod" };
    info!("Using API route prefix: {}", prefix);

    create_router_with_store(dynamo_store, prefix)
}

/// Creates a router with a given store implementation
pub fn create_router_with_store<S>(store: Arc<S>, prefix: &str) -> Router
where
    S: EventDataStore + 'static,
{
    info!("Setting up event API routes with prefix: '{}'", prefix);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    async fn logging_middleware(
        req: Request,
        next: axum::middleware::Next,
    ) -> impl axum::response::IntoResponse {
        info!(
            "Router received request: method={}, uri={}",
            req.method(),
            req.uri()
        );
        next.run(req).await
    }

    // Owner routes, all behind the bearer token
    let owner_routes = Router::new()
        .route("/events", get(get_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/:id/cancel", post(cancel_event))
        .route("/events/:id/summary", get(get_event_summary))
        .route("/events/:id/tables", put(update_tables))
        .route("/events/:id/guests", get(get_guests).post(create_guest))
        .route("/events/:id/guests/bulk", post(bulk_create_guests))
        .route(
            "/events/:id/guests/:guest_id",
            axum::routing::patch(update_guest).delete(delete_guest),
        )
        .route(
            "/events/:id/notifications",
            get(get_notifications).post(create_notification),
        )
        .route(
            "/events/:id/notifications/:notification_id",
            axum::routing::patch(update_notification).delete(delete_notification),
        )
        .route(
            "/events/:id/notifications/:notification_id/send",
            post(send_notification_now),
        )
        .route(
            "/events/:id/notifications/:notification_id/logs",
            get(get_send_logs),
        )
        .layer(middleware::from_fn(auth_middleware))
        .with_state(store.clone());

    // Guest-facing RSVP links carry no credentials
    let rsvp_routes = Router::new()
        .route(
            "/rsvp/:event_id/:guest_id",
            get(get_rsvp).put(submit_rsvp),
        )
        .with_state(store);

    let api_routes = owner_routes.merge(rsvp_routes);

    let router = if prefix.is_empty() {
        api_routes
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    } else {
        Router::new()
            .nest(prefix, api_routes)
            .layer(cors)
            .layer(middleware::from_fn(logging_middleware))
    };

    router.fallback(|req: Request| async move {
        warn!("No route matched for: {} {}", req.method(), req.uri());
        (
            axum::http::StatusCode::NOT_FOUND,
            "The requested resource was not found".to_string(),
        )
    })
}
