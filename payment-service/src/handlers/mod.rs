pub mod pay_handlers;
pub mod payment_request_handlers;
pub mod webhook_handlers;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use eventdesk_shared::error::{AppError, Result, StoreError};
use eventdesk_shared::models::{parse_timestamp, PaymentRequest, PaymentStatus};
use eventdesk_shared::store::PaymentStore;
use log::info;
use uuid::Uuid;

/// Unguessable public token for a payment request (22 URL-safe characters)
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

/// Loads a payment request and checks that `user_id` owns it
pub async fn load_owned_request<S>(store: &S, token: &str, user_id: &str) -> Result<PaymentRequest>
where
    S: PaymentStore + ?Sized,
{
    let request = store.get_payment_request(token).await?;
    if request.owner_id != user_id {
        return Err(AppError::forbidden(
            "You don't have permission to access this payment request".into(),
        ));
    }
    Ok(request)
}

pub fn is_past_expiry(request: &PaymentRequest, now: DateTime<Utc>) -> bool {
    match &request.expires_at {
        Some(expires_at) => parse_timestamp(expires_at).map_or(true, |expiry| expiry <= now),
        None => false,
    }
}

/// Moves an active request whose expiry has passed to `expired` and returns
/// the stored state.
pub async fn expire_if_due<S>(
    store: &S,
    request: PaymentRequest,
    now: DateTime<Utc>,
) -> Result<PaymentRequest>
where
    S: PaymentStore + ?Sized,
{
    if request.status != PaymentStatus::Active || !is_past_expiry(&request, now) {
        return Ok(request);
    }

    info!("Payment request {} expired, updating status", request.token);
    match store
        .transition_payment_request(&request.token, PaymentStatus::Active, PaymentStatus::Expired)
        .await
    {
        Ok(expired) => Ok(expired),
        // a confirmation or the owner moved it first; report what is stored
        Err(StoreError::Conflict(_)) => Ok(store.get_payment_request(&request.token).await?),
        Err(e) => Err(e.into()),
    }
}
