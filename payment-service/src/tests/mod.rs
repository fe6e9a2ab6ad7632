mod pay_handlers_test;
mod webhook_handlers_test;

use axum::{http::StatusCode, Router};
use eventdesk_shared::auth::{create_public_request, create_test_request};
use eventdesk_shared::config::PaymentConfig;
use eventdesk_shared::models::{FeeMode, PaymentKind, PaymentRequest, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use eventdesk_shared::test_utils::http_test_utils::response_to_json;
use eventdesk_shared::test_utils::mock_payment_store::MockPaymentStore;
use eventdesk_shared::test_utils::test_logging::init_test_logging;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::routes::create_router_with_store;

pub const OWNER: &str = "owner-1";
pub const WEBHOOK_SECRET: &str = "whsec-test";

pub fn test_config() -> PaymentConfig {
    PaymentConfig {
        checkout_base_url: "https://checkout.test/pay".into(),
        return_url_base: "https://events.test".into(),
        provider_name: "test-provider".into(),
        webhook_secret: Some(WEBHOOK_SECRET.into()),
    }
}

pub fn create_test_app() -> (Router, Arc<MockPaymentStore>) {
    init_test_logging();
    let store = Arc::new(MockPaymentStore::new());
    let app = create_router_with_store(store.clone(), test_config(), "");
    (app, store)
}

/// Sends an authenticated request as `user_id`
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user_id: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(create_test_request(method, uri, user_id, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_to_json(response).await)
}

/// Sends a request without credentials
pub async fn public_call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(create_public_request(method, uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_to_json(response).await)
}

/// The worked example: open gift, 2.00 + 3% fee, 18% VAT, charged on top
pub fn gift_request(token: &str) -> PaymentRequest {
    PaymentRequest {
        token: token.into(),
        owner_id: OWNER.into(),
        event_id: None,
        title: "Wedding gift".into(),
        description: None,
        kind: PaymentKind::OpenGift,
        amount: None,
        min_amount: Some(20.0),
        currency: "ILS".into(),
        fee_mode: FeeMode::AddOn,
        fee_fixed: 2.0,
        fee_percent: 0.03,
        vat_rate: 0.18,
        usage_limit: 1,
        uses_so_far: 0,
        status: PaymentStatus::Active,
        expires_at: None,
        paid_at: None,
        created_at: "2026-01-01T00:00:00+00:00".into(),
        updated_at: "2026-01-01T00:00:00+00:00".into(),
    }
}

pub async fn seed(store: &MockPaymentStore, request: PaymentRequest) {
    store.create_payment_request(request).await.unwrap();
}
