use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use eventdesk_shared::config::{AppLinks, PaymentConfig};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::fees::validate_terms;
use eventdesk_shared::models::{now_str, OptionalField, PaymentRequest, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use log::info;
use std::sync::Arc;

use super::{expire_if_due, generate_token, is_past_expiry, load_owned_request};
use crate::models::{
    CreatePaymentRequestRequest, PaymentRequestResponse, TransactionResponse,
    UpdatePaymentRequestRequest,
};

fn to_response(config: &PaymentConfig, request: PaymentRequest) -> PaymentRequestResponse {
    let pay_link = AppLinks::new(config.return_url_base.as_str()).pay_link(&request.token);
    PaymentRequestResponse::new(request, pay_link)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// POST /payment-requests
// New requests start as drafts.
pub async fn create_payment_request<S>(
    State(store): State<Arc<S>>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<CreatePaymentRequestRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)>
where
    S: PaymentStore,
{
    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("Title cannot be empty".into()));
    }

    let now = now_str();
    let request = PaymentRequest {
        token: generate_token(),
        owner_id: user_id,
        event_id: clean(payload.event_id),
        title: payload.title.trim().to_string(),
        description: clean(payload.description),
        kind: payload.kind,
        amount: payload.amount,
        min_amount: payload.min_amount,
        currency: payload.currency.trim().to_uppercase(),
        fee_mode: payload.fee_mode,
        fee_fixed: payload.fee_fixed,
        fee_percent: payload.fee_percent,
        vat_rate: payload.vat_rate,
        usage_limit: payload.usage_limit,
        uses_so_far: 0,
        status: PaymentStatus::Draft,
        expires_at: payload.expires_at,
        paid_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    validate_terms(&request)?;

    let created = store.create_payment_request(request).await?;
    info!(
        "Created payment request {} for owner {}",
        created.token, created.owner_id
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "paymentRequest": to_response(&config, created) })),
    ))
}

// GET /payment-requests
pub async fn get_payment_requests<S>(
    State(store): State<Arc<S>>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let now = Utc::now();
    let mut requests = Vec::new();
    for request in store.get_payment_requests_by_owner(&user_id).await? {
        let request = expire_if_due(&*store, request, now).await?;
        requests.push(to_response(&config, request));
    }

    Ok(Json(serde_json::json!({ "paymentRequests": requests })))
}

// GET /payment-requests/:token
pub async fn get_payment_request<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_owned_request(&*store, &token, &user_id).await?;
    let request = expire_if_due(&*store, request, Utc::now()).await?;

    Ok(Json(
        serde_json::json!({ "paymentRequest": to_response(&config, request) }),
    ))
}

// PATCH /payment-requests/:token
pub async fn update_payment_request<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
    Json(payload): Json<UpdatePaymentRequestRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let mut request = load_owned_request(&*store, &token, &user_id).await?;
    if request.status != PaymentStatus::Draft {
        return Err(AppError::bad_request(format!(
            "Payment request is {}; only drafts can be edited.",
            request.status
        )));
    }

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("Title cannot be empty".into()));
        }
        request.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        request.description = clean(description.into_option());
    }
    if let Some(kind) = payload.kind {
        request.kind = kind;
    }
    if let Some(amount) = payload.amount {
        request.amount = amount.into_option();
    }
    if let Some(min_amount) = payload.min_amount {
        request.min_amount = min_amount.into_option();
    }
    if let Some(currency) = payload.currency {
        request.currency = currency.trim().to_uppercase();
    }
    if let Some(fee_mode) = payload.fee_mode {
        request.fee_mode = fee_mode;
    }
    if let Some(fee_fixed) = payload.fee_fixed {
        request.fee_fixed = fee_fixed;
    }
    if let Some(fee_percent) = payload.fee_percent {
        request.fee_percent = fee_percent;
    }
    if let Some(vat_rate) = payload.vat_rate {
        request.vat_rate = vat_rate;
    }
    if let Some(usage_limit) = payload.usage_limit {
        request.usage_limit = usage_limit;
    }
    match payload.expires_at {
        Some(OptionalField::Value(expires_at)) => request.expires_at = Some(expires_at),
        Some(OptionalField::Null) => request.expires_at = None,
        None => {}
    }

    validate_terms(&request)?;
    request.updated_at = now_str();
    let updated = store.update_payment_request(request).await?;

    Ok(Json(
        serde_json::json!({ "paymentRequest": to_response(&config, updated) }),
    ))
}

// POST /payment-requests/:token/activate
pub async fn activate_payment_request<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_owned_request(&*store, &token, &user_id).await?;
    if !request.status.can_transition_to(PaymentStatus::Active) {
        return Err(AppError::bad_request(format!(
            "Payment request is {} and cannot be activated.",
            request.status
        )));
    }

    validate_terms(&request)?;
    if is_past_expiry(&request, Utc::now()) {
        return Err(AppError::bad_request(
            "Expiry date has already passed.".into(),
        ));
    }

    let updated = store
        .transition_payment_request(&request.token, request.status, PaymentStatus::Active)
        .await?;
    info!("Payment request {} is now active", updated.token);

    Ok(Json(
        serde_json::json!({ "paymentRequest": to_response(&config, updated) }),
    ))
}

// POST /payment-requests/:token/cancel
pub async fn cancel_payment_request<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_owned_request(&*store, &token, &user_id).await?;
    let request = expire_if_due(&*store, request, Utc::now()).await?;
    if !request.status.can_transition_to(PaymentStatus::Canceled) {
        return Err(AppError::bad_request(format!(
            "Payment request is {} and cannot be canceled.",
            request.status
        )));
    }

    // 409 if a payment or expiry landed since the read
    let updated = store
        .transition_payment_request(&request.token, request.status, PaymentStatus::Canceled)
        .await?;
    info!("Payment request {} canceled by owner", updated.token);

    Ok(Json(
        serde_json::json!({ "paymentRequest": to_response(&config, updated) }),
    ))
}

// GET /payment-requests/:token/transactions
pub async fn get_transactions<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(user_id): Extension<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_owned_request(&*store, &token, &user_id).await?;
    let transactions: Vec<_> = store
        .get_transactions_by_token(&request.token)
        .await?
        .into_iter()
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(serde_json::json!({ "transactions": transactions })))
}
