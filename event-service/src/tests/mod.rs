
use axum::{http::StatusCode, Router};
use eventdesk_shared::auth::create_test_request;
use eventdesk_shared::test_utils::http_test_utils::response_to_json;
use eventdesk_shared::test_utils::mock_event_store::MockEventStore;
use eventdesk_shared::test_utils::test_logging::init_test_logging;
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;
use tower::ServiceExt;

use crate::routes::create_router_with_store;

pub const OWNER: &str = "owner-1";

/// Router over a fresh in-memory store, with SNS publishing disabled
pub fn create_test_app() -> (Router, Arc<MockEventStore>) {
    init_test_logging();
    env::set_var(
        "SNS_TOPIC_ARN",
        "arn:aws:sns:us-east-1:123456789012:test-topic",
    );
    env::set_var("TEST_SNS", "true");

    let store = Arc::new(MockEventStore::new());
    let app = create_router_with_store(store.clone(), "");
    (app, store)
}

/// Sends an authenticated request as `user_id` and returns status and JSON body
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

/// Creates an event with two tables (1 seats 4, 2 seats 2) and returns its id
pub async fn create_seated_event(app: &Router) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/events",
        OWNER,
        Some(json!({
            "name": "Dana & Lior",
            "eventType": "wedding",
            "eventDate": "2030-06-01T19:00:00Z",
            "venue": "Garden Hall",
            "tables": [
                { "number": 1, "name": "Family", "capacity": 4 },
                { "number": 2, "capacity": 2 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["event"]["id"].as_str().unwrap().to_string()
}

/// Adds a guest to the event and returns the guest id
pub async fn add_guest(app: &Router, event_id: &str, guest: Value) -> String {
    let (status, body) = call(
        app,
        "POST",
        &format!("/events/{}/guests", event_id),
        OWNER,
        Some(guest),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["guest"]["id"].as_str().unwrap().to_string()
}
