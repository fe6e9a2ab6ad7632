use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use eventdesk_shared::auth::auth_middleware;
use eventdesk_shared::config::PaymentConfig;
use eventdesk_shared::store::{dynamo::DynamoPaymentStore, PaymentStore};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{
    pay_handlers::{get_pay_page, quote_payment, start_checkout},
    payment_request_handlers::{
        activate_payment_request, cancel_payment_request, create_payment_request,
        get_payment_request, get_payment_requests, get_transactions, update_payment_request,
    },
    webhook_handlers::payment_callback,
};

/// Creates a router backed by DynamoDB and configured from the environment
pub async fn create_router() -> Router {
    info!("Creating router with DynamoDB store");

    let dynamo_store = Arc::new(DynamoPaymentStore::new().await);
    let config = PaymentConfig::from_env();

    let remove_base_path = std::env::var("REMOVE_BASE_PATH")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    let prefix = if remove_base_path { "" } else { "/Prod" };
    info!("Using API route prefix: {}", prefix);

    create_router_with_store(dynamo_store, config, prefix)
}

/// Creates a router with a given store implementation
pub fn create_router_with_store<S>(store: Arc<S>, config: PaymentConfig, prefix: &str) -> Router
where
    S: PaymentStore + 'static,
{
    info!("Setting up payment API routes with prefix: '{}'", prefix);

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

    let owner_routes = Router::new()
        .route(
            "/payment-requests",
            get(get_payment_requests).post(create_payment_request),
        )
        .route(
            "/payment-requests/:token",
            get(get_payment_request).patch(update_payment_request),
        )
        .route(
            "/payment-requests/:token/activate",
            post(activate_payment_request),
        )
        .route(
            "/payment-requests/:token/cancel",
            post(cancel_payment_request),
        )
        .route(
            "/payment-requests/:token/transactions",
            get(get_transactions),
        )
        .layer(middleware::from_fn(auth_middleware))
        .with_state(store.clone());

    // Payers and the provider do not hold user tokens
    let public_routes = Router::new()
        .route("/pay/:token", get(get_pay_page))
        .route("/pay/:token/quote", post(quote_payment))
        .route("/pay/:token/checkout", post(start_checkout))
        .route("/webhooks/payments", post(payment_callback))
        .with_state(store);

    let api_routes = owner_routes
        .merge(public_routes)
        .layer(Extension(Arc::new(config)));

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
