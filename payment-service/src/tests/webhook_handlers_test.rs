use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use eventdesk_shared::models::{FeeMode, PaymentKind, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use eventdesk_shared::test_utils::http_test_utils::response_to_json;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{create_test_app, gift_request, seed, WEBHOOK_SECRET};

async fn callback(app: &Router, secret: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-webhook-secret", secret);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, response_to_json(response).await)
}

fn paid(token: &str, transaction_id: &str, amount: f64) -> Value {
    json!({
        "token": token,
        "transactionId": transaction_id,
        "status": "paid",
        "amount": amount,
        "giftAmount": 50,
        "payerName": "Avi"
    })
}

#[tokio::test]
async fn test_paid_callback_records_payment_once() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let (status, body) = callback(&app, Some(WEBHOOK_SECRET), paid("tok-1", "txn-1", 54.13)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "paid");
    assert_eq!(body["usesSoFar"], 1);

    let (status, body) = callback(&app, Some(WEBHOOK_SECRET), paid("tok-1", "txn-1", 54.13)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "already processed");

    let stored = store.get_payment_request("tok-1").await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Paid);
    assert_eq!(stored.uses_so_far, 1);
    assert!(stored.paid_at.is_some());

    let transactions = store.get_transactions_by_token("tok-1").await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].id, "test-provider#txn-1");
    assert_eq!(transactions[0].amount, 54.13);

    // a different transaction after the single use is spent
    let (status, _) = callback(&app, Some(WEBHOOK_SECRET), paid("tok-1", "txn-2", 54.13)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_multi_use_request_stays_active_until_limit() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-multi");
    request.usage_limit = 2;
    seed(&store, request).await;

    callback(&app, Some(WEBHOOK_SECRET), paid("tok-multi", "a", 54.13)).await;
    let stored = store.get_payment_request("tok-multi").await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Active);
    assert_eq!(stored.uses_so_far, 1);

    callback(&app, Some(WEBHOOK_SECRET), paid("tok-multi", "b", 54.13)).await;
    let stored = store.get_payment_request("tok-multi").await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Paid);
    assert_eq!(stored.uses_so_far, 2);
}

#[tokio::test]
async fn test_amount_tolerance() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;
    seed(&store, gift_request("tok-2")).await;

    // 54.13 expected; off by more than 0.50 fails closed
    let (status, body) = callback(&app, Some(WEBHOOK_SECRET), paid("tok-1", "t1", 54.70)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not match"));
    assert!(store.get_transactions_by_token("tok-1").await.unwrap().is_empty());

    let (status, _) = callback(&app, Some(WEBHOOK_SECRET), paid("tok-2", "t2", 54.50)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_callback_requires_secret() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let (status, _) = callback(&app, None, paid("tok-1", "t1", 54.13)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = callback(&app, Some("wrong"), paid("tok-1", "t1", 54.13)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(
        store.get_payment_request("tok-1").await.unwrap().uses_so_far,
        0
    );
}

#[tokio::test]
async fn test_non_paid_callbacks_are_ignored() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let mut body = paid("tok-1", "t1", 54.13);
    body["status"] = json!("failed");
    let (status, _) = callback(&app, Some(WEBHOOK_SECRET), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        store.get_payment_request("tok-1").await.unwrap().uses_so_far,
        0
    );

    let (status, _) = callback(&app, Some(WEBHOOK_SECRET), paid("unknown", "t1", 54.13)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_never_exceed_usage_limit() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-rush");
    request.usage_limit = 2;
    seed(&store, request).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let body = paid("tok-rush", &format!("txn-{}", i), 54.13);
                callback(&app, Some(WEBHOOK_SECRET), body).await.0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    let recorded = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let rejected = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(recorded, 2, "{:?}", statuses);
    assert_eq!(rejected, 6, "{:?}", statuses);

    let stored = store.get_payment_request("tok-rush").await.unwrap();
    assert_eq!(stored.uses_so_far, 2);
    assert_eq!(stored.status, PaymentStatus::Paid);
    assert_eq!(store.get_transactions_by_token("tok-rush").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fixed_payment_transaction_has_no_gift_amount() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-fixed");
    request.kind = PaymentKind::FixedPayment;
    request.amount = Some(100.0);
    request.min_amount = None;
    request.fee_mode = FeeMode::Included;
    request.fee_fixed = 0.0;
    request.fee_percent = 0.0;
    request.vat_rate = 0.0;
    seed(&store, request).await;

    let (status, body) =
        callback(&app, Some(WEBHOOK_SECRET), paid("tok-fixed", "txn-f", 100.0)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let transactions = store.get_transactions_by_token("tok-fixed").await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 100.0);
    assert_eq!(transactions[0].gift_amount, None);

    // open gifts still keep the gift the payer chose
    seed(&store, gift_request("tok-gift")).await;
    callback(&app, Some(WEBHOOK_SECRET), paid("tok-gift", "txn-g", 54.13)).await;
    let transactions = store.get_transactions_by_token("tok-gift").await.unwrap();
    assert_eq!(transactions[0].gift_amount, Some(50.0));
}

#[tokio::test]
async fn test_secret_of_wrong_length_is_rejected() {
    let (app, _) = create_test_app();
    let longer = format!("{}-extra", WEBHOOK_SECRET);

    let (status, _) = callback(&app, Some(longer.as_str()), paid("tok-1", "txn-1", 54.13)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = callback(&app, Some(&WEBHOOK_SECRET[..4]), paid("tok-1", "txn-1", 54.13)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
