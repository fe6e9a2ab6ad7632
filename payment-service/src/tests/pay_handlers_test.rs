use axum::http::StatusCode;
use chrono::{Duration, Utc};
use eventdesk_shared::models::{PaymentKind, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use reqwest::Url;
use serde_json::json;
use std::collections::HashMap;

use super::{create_test_app, gift_request, public_call, seed};

#[tokio::test]
async fn test_pay_page_hides_drafts() {
    let (app, store) = create_test_app();
    let mut draft = gift_request("tok-draft");
    draft.status = PaymentStatus::Draft;
    seed(&store, draft).await;
    seed(&store, gift_request("tok-live")).await;

    let (status, _) = public_call(&app, "GET", "/pay/tok-draft", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = public_call(&app, "GET", "/pay/tok-live", None).await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["paymentRequest"];
    assert_eq!(view["title"], "Wedding gift");
    assert_eq!(view["kind"], "open-gift");
    assert_eq!(view["minAmount"], 20.0);
    assert_eq!(view["remainingUses"], 1);
    assert!(view.get("ownerId").is_none());
    assert!(view.get("feeFixed").is_none());
}

#[tokio::test]
async fn test_quote_add_on_fees() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let (status, body) = public_call(
        &app,
        "POST",
        "/pay/tok-1/quote",
        Some(json!({ "giftAmount": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let quote = &body["quote"];
    assert_eq!(quote["currency"], "ILS");
    assert_eq!(quote["baseAmount"], 50.0);
    assert_eq!(quote["feeBase"], 3.5);
    assert_eq!(quote["feeVat"], 0.63);
    assert_eq!(quote["amountToCharge"], 54.13);
}

#[tokio::test]
async fn test_quote_rejects_invalid_gifts() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let (status, body) = public_call(
        &app,
        "POST",
        "/pay/tok-1/quote",
        Some(json!({ "giftAmount": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at least 20.00"));

    let (status, _) = public_call(&app, "POST", "/pay/tok-1/quote", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = public_call(
        &app,
        "POST",
        "/pay/tok-1/quote",
        Some(json!({ "giftAmount": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fixed_payment_ignores_gift_amount() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-fixed");
    request.kind = PaymentKind::FixedPayment;
    request.amount = Some(100.0);
    seed(&store, request).await;

    let (status, body) = public_call(
        &app,
        "POST",
        "/pay/tok-fixed/quote",
        Some(json!({ "giftAmount": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"]["amountToCharge"], 100.0);
    assert_eq!(body["quote"]["feeBase"], 0.0);
}

#[tokio::test]
async fn test_checkout_redirects_with_recomputed_amount() {
    let (app, store) = create_test_app();
    seed(&store, gift_request("tok-1")).await;

    let (status, body) = public_call(
        &app,
        "POST",
        "/pay/tok-1/checkout",
        Some(json!({ "giftAmount": 50, "payerName": "Avi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let checkout = &body["checkout"];
    assert_eq!(checkout["amountToCharge"], 54.13);
    let url = Url::parse(checkout["redirectUrl"].as_str().unwrap()).unwrap();
    assert_eq!(url.host_str(), Some("checkout.test"));
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["token"], "tok-1");
    assert_eq!(params["amount"], "54.13");
    assert_eq!(params["currency"], "ILS");
    assert_eq!(params["giftAmount"], "50.00");
    assert_eq!(params["returnUrl"], "https://events.test/pay/tok-1");
}

#[tokio::test]
async fn test_expired_link_is_gone() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-old");
    request.expires_at = Some((Utc::now() - Duration::hours(2)).to_rfc3339());
    seed(&store, request).await;

    let (status, _) = public_call(
        &app,
        "POST",
        "/pay/tok-old/checkout",
        Some(json!({ "giftAmount": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);

    let stored = store.get_payment_request("tok-old").await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Expired);

    let (status, _) = public_call(&app, "GET", "/pay/tok-old", None).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_exhausted_request_cannot_be_paid() {
    let (app, store) = create_test_app();
    let mut request = gift_request("tok-paid");
    request.status = PaymentStatus::Paid;
    request.uses_so_far = 1;
    seed(&store, request).await;

    // still viewable, so the payer can see it was settled
    let (status, body) = public_call(&app, "GET", "/pay/tok-paid", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentRequest"]["status"], "paid");

    let (status, _) = public_call(
        &app,
        "POST",
        "/pay/tok-paid/checkout",
        Some(json!({ "giftAmount": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
