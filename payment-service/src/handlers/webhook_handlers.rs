use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use eventdesk_shared::config::PaymentConfig;
use eventdesk_shared::error::{AppError, Result};
use eventdesk_shared::fees::reconcile;
use eventdesk_shared::models::{now_str, PaymentKind, PaymentTransaction, RecordOutcome};
use eventdesk_shared::store::PaymentStore;
use log::{info, warn};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::models::PaymentCallback;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

fn check_secret(config: &PaymentConfig, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = config.webhook_secret.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        warn!("Payment callback with missing or wrong webhook secret");
        return Err(AppError::unauthorized("Invalid webhook secret".into()));
    }
    Ok(())
}

// POST /webhooks/payments
pub async fn payment_callback<S>(
    State(store): State<Arc<S>>,
    Extension(config): Extension<Arc<PaymentConfig>>,
    headers: HeaderMap,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<serde_json::Value>>
where
    S: PaymentStore,
{
    check_secret(&config, &headers)?;

    if !callback.status.eq_ignore_ascii_case("paid") {
        info!(
            "Ignoring {} callback for transaction {}",
            callback.status, callback.transaction_id
        );
        return Ok(Json(
            serde_json::json!({ "message": "Callback acknowledged" }),
        ));
    }

    if callback.transaction_id.trim().is_empty() {
        return Err(AppError::bad_request("Missing transaction id".into()));
    }

    let request = store.get_payment_request(&callback.token).await?;

    // the provider's amount is only compared, never stored as the truth
    let expected = reconcile(&request, callback.amount, callback.gift_amount).map_err(|e| {
        warn!(
            "Rejected callback for {} transaction {}: {}",
            request.token, callback.transaction_id, e
        );
        AppError::from(e)
    })?;

    let provider = callback
        .provider
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| config.provider_name.clone());
    let transaction = PaymentTransaction {
        id: PaymentTransaction::key(&provider, &callback.transaction_id),
        token: request.token.clone(),
        provider,
        transaction_id: callback.transaction_id.clone(),
        amount: expected.amount_to_charge,
        gift_amount: match request.kind {
            PaymentKind::OpenGift => Some(expected.base_amount),
            PaymentKind::FixedPayment => None,
        },
        payer_name: callback.payer_name,
        created_at: now_str(),
    };

    match store.record_payment(transaction).await? {
        RecordOutcome::Recorded(updated) => {
            info!(
                "Recorded payment {} for {}: {} of {} uses, status {}",
                callback.transaction_id,
                updated.token,
                updated.uses_so_far,
                updated.usage_limit,
                updated.status
            );
            Ok(Json(serde_json::json!({
                "message": "Payment recorded",
                "status": updated.status,
                "usesSoFar": updated.uses_so_far
            })))
        }
        RecordOutcome::Duplicate => {
            info!(
                "Transaction {} for {} already processed",
                callback.transaction_id, request.token
            );
            Ok(Json(serde_json::json!({ "message": "already processed" })))
        }
        RecordOutcome::LimitReached => {
            warn!(
                "Transaction {} arrived after {} stopped accepting payments",
                callback.transaction_id, request.token
            );
            Err(AppError::conflict(
                "Payment request is no longer accepting payments".into(),
            ))
        }
    }
}
