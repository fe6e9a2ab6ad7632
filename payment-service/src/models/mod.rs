use eventdesk_shared::fees::ChargeBreakdown;
use eventdesk_shared::models::{
    deserialize_optional_field, FeeMode, OptionalField, PaymentKind, PaymentRequest,
    PaymentStatus, PaymentTransaction,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "ILS";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_usage_limit() -> u32 {
    1
}

// Request DTOs
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequestRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    pub kind: PaymentKind,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub fee_mode: FeeMode,
    #[serde(default)]
    pub fee_fixed: f64,
    #[serde(default)]
    pub fee_percent: f64,
    #[serde(default)]
    pub vat_rate: f64,
    #[serde(default = "default_usage_limit")]
    pub usage_limit: u32,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Changes to a draft; explicit `null` clears an optional field
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequestRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub description: Option<OptionalField<String>>,
    pub kind: Option<PaymentKind>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub amount: Option<OptionalField<f64>>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub min_amount: Option<OptionalField<f64>>,
    pub currency: Option<String>,
    pub fee_mode: Option<FeeMode>,
    pub fee_fixed: Option<f64>,
    pub fee_percent: Option<f64>,
    pub vat_rate: Option<f64>,
    pub usage_limit: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub expires_at: Option<OptionalField<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default)]
    pub gift_amount: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub gift_amount: Option<f64>,
    #[serde(default)]
    pub payer_name: Option<String>,
}

/// Callback posted by the payment provider once a checkout settles.
///
/// Nothing in here is trusted beyond identifying the request and transaction.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub token: String,
    pub transaction_id: String,
    pub status: String,
    pub amount: f64,
    #[serde(default)]
    pub gift_amount: Option<f64>,
    #[serde(default)]
    pub payer_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

// Response DTOs

/// The owner's view of a payment request
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestResponse {
    pub token: String,
    pub event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub kind: PaymentKind,
    pub amount: Option<f64>,
    pub min_amount: Option<f64>,
    pub currency: String,
    pub fee_mode: FeeMode,
    pub fee_fixed: f64,
    pub fee_percent: f64,
    pub vat_rate: f64,
    pub usage_limit: u32,
    pub uses_so_far: u32,
    pub remaining_uses: u32,
    pub status: PaymentStatus,
    pub expires_at: Option<String>,
    pub paid_at: Option<String>,
    pub pay_link: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PaymentRequestResponse {
    pub fn new(request: PaymentRequest, pay_link: String) -> Self {
        Self {
            remaining_uses: request.remaining_uses(),
            token: request.token,
            event_id: request.event_id,
            title: request.title,
            description: request.description,
            kind: request.kind,
            amount: request.amount,
            min_amount: request.min_amount,
            currency: request.currency,
            fee_mode: request.fee_mode,
            fee_fixed: request.fee_fixed,
            fee_percent: request.fee_percent,
            vat_rate: request.vat_rate,
            usage_limit: request.usage_limit,
            uses_so_far: request.uses_so_far,
            status: request.status,
            expires_at: request.expires_at,
            paid_at: request.paid_at,
            pay_link,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// What a payer sees on the public pay page
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicPaymentView {
    pub token: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: PaymentKind,
    pub amount: Option<f64>,
    pub min_amount: Option<f64>,
    pub currency: String,
    pub fee_mode: FeeMode,
    pub status: PaymentStatus,
    pub expires_at: Option<String>,
    pub remaining_uses: u32,
}

impl From<PaymentRequest> for PublicPaymentView {
    fn from(request: PaymentRequest) -> Self {
        Self {
            remaining_uses: request.remaining_uses(),
            token: request.token,
            title: request.title,
            description: request.description,
            kind: request.kind,
            amount: request.amount,
            min_amount: request.min_amount,
            currency: request.currency,
            fee_mode: request.fee_mode,
            status: request.status,
            expires_at: request.expires_at,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub currency: String,
    #[serde(flatten)]
    pub breakdown: ChargeBreakdown,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub redirect_url: String,
    pub currency: String,
    #[serde(flatten)]
    pub breakdown: ChargeBreakdown,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub provider: String,
    pub transaction_id: String,
    pub amount: f64,
    pub gift_amount: Option<f64>,
    pub payer_name: Option<String>,
    pub created_at: String,
}

impl From<PaymentTransaction> for TransactionResponse {
    fn from(txn: PaymentTransaction) -> Self {
        Self {
            provider: txn.provider,
            transaction_id: txn.transaction_id,
            amount: txn.amount,
            gift_amount: txn.gift_amount,
            payer_name: txn.payer_name,
            created_at: txn.created_at,
        }
    }
}
