use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use eventdesk_shared::config::{AppLinks, PaymentConfig};
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::fees::{compute_charge, validate_payable, ChargeBreakdown};
use eventdesk_shared::models::{PaymentKind, PaymentRequest, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use log::{info, warn};
use reqwest::Url;
use std::sync::Arc;

use super::expire_if_due;
use crate::models::{
    CheckoutRequest, CheckoutResponse, PublicPaymentView, QuoteRequest, QuoteResponse,
};

/// Loads a request as seen by a payer. Drafts are not published yet and
/// look exactly like unknown tokens.
async fn load_published<S>(store: &S, token: &str, now: DateTime<Utc>) -> Result<PaymentRequest>
where
    S: PaymentStore + ?Sized,
{
    let request = store.get_payment_request(token).await?;
    if request.status == PaymentStatus::Draft {
        return Err(AppError::not_found(format!(
            "Payment request {} not found",
            token
        )));
    }

    let request = expire_if_due(store, request, now).await?;
    if request.status == PaymentStatus::Expired {
        return Err(AppError::gone("This payment link has expired.".into()));
    }
    Ok(request)
}

async fn load_payable<S>(store: &S, token: &str) -> Result<PaymentRequest>
where
    S: PaymentStore + ?Sized,
{
    let now = Utc::now();
    let request = load_published(store, token, now).await?;
    validate_payable(&request, now)?;
    Ok(request)
}

/// Builds the hosted checkout URL for a computed charge
pub fn checkout_url(
    config: &PaymentConfig,
    request: &PaymentRequest,
    charge: &ChargeBreakdown,
) -> Result<String> {
    let return_url = AppLinks::new(config.return_url_base.as_str()).pay_link(&request.token);
    let amount = format!("{:.2}", charge.amount_to_charge);
    let gift_amount = format!("{:.2}", charge.base_amount);

    let mut params = vec![
        ("token", request.token.as_str()),
        ("amount", amount.as_str()),
        ("currency", request.currency.as_str()),
    ];
    if request.kind == PaymentKind::OpenGift {
        params.push(("giftAmount", gift_amount.as_str()));
    }
    params.push(("returnUrl", return_url.as_str()));

    let url = Url::parse_with_params(&config.checkout_base_url, &params).map_err(|e| {
        AppError::internal_server_error(format!("Invalid checkout base URL: {}", e))
    })?;
    Ok(url.to_string())
}

// GET /pay/:token
pub async fn get_pay_page<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_published(&*store, &token, Utc::now()).await?;

    Ok(Json(
        serde_json::json!({ "paymentRequest": PublicPaymentView::from(request) }),
    ))
}

// POST /pay/:token/quote
pub async fn quote_payment<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_payable(&*store, &token).await?;
    let breakdown = compute_charge(&request, payload.gift_amount)?;

    Ok(Json(serde_json::json!({
        "quote": QuoteResponse {
            currency: request.currency,
            breakdown,
        }
    })))
}

// POST /pay/:token/checkout
// The charged amount is always recomputed from the stored terms.
pub async fn start_checkout<S>(
    State(store): State<Arc<S>>,
    Path(token): Path<String>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    let request = load_payable(&*store, &token).await?;
    let breakdown = compute_charge(&request, payload.gift_amount).map_err(|e| {
        warn!("Rejected checkout for {}: {}", token, e);
        AppError::from(e)
    })?;
    let redirect_url = checkout_url(&config, &request, &breakdown)?;

    info!(
        "Starting checkout for {} ({:.2} {}), payer={}",
        request.token,
        breakdown.amount_to_charge,
        request.currency,
        payload.payer_name.as_deref().unwrap_or("anonymous")
    );

    Ok(Json(serde_json::json!({
        "checkout": CheckoutResponse {
            redirect_url,
            currency: request.currency,
            breakdown,
        }
    })))
}
