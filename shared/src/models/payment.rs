use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentKind {
    /// The owner fixes the amount; fee settings are ignored
    FixedPayment,
    /// The payer chooses the amount, optionally bounded by a minimum
    OpenGift,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FeeMode {
    /// The service fee is absorbed into what the payer sees
    #[default]
    Included,
    /// The service fee and its VAT are charged on top of the gift
    AddOn,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    #[default]
    Draft,
    Active,
    Paid,
    Expired,
    Canceled,
}

impl PaymentStatus {
    /// Status only ever moves forward: draft -> active -> paid | expired | canceled.
    /// A draft may also be canceled directly.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Draft, Canceled) | (Active, Paid) | (Active, Expired) | (Active, Canceled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Expired | PaymentStatus::Canceled
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Draft => "draft",
            PaymentStatus::Active => "active",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

/// A shareable, token-addressed request to collect money from a payer
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PaymentRequest {
    pub token: String,
    pub owner_id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: PaymentKind,
    /// Amount to charge for fixed payments
    #[serde(default)]
    pub amount: Option<f64>,
    /// Lower bound on the gift amount for open gifts
    #[serde(default)]
    pub min_amount: Option<f64>,
    pub currency: String,
    #[serde(default)]
    pub fee_mode: FeeMode,
    #[serde(default)]
    pub fee_fixed: f64,
    #[serde(default)]
    pub fee_percent: f64,
    #[serde(default)]
    pub vat_rate: f64,
    pub usage_limit: u32,
    #[serde(default)]
    pub uses_so_far: u32,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PaymentRequest {
    pub fn remaining_uses(&self) -> u32 {
        self.usage_limit.saturating_sub(self.uses_so_far)
    }

    /// Active with every use consumed: the last confirmation was recorded
    /// but the request was never closed as paid.
    pub fn needs_closing(&self) -> bool {
        self.status == PaymentStatus::Active && self.uses_so_far >= self.usage_limit
    }
}

/// A confirmed provider transaction, keyed by provider and provider transaction id
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PaymentTransaction {
    pub id: String,
    pub token: String,
    pub provider: String,
    pub transaction_id: String,
    pub amount: f64,
    #[serde(default)]
    pub gift_amount: Option<f64>,
    #[serde(default)]
    pub payer_name: Option<String>,
    pub created_at: String,
}

impl PaymentTransaction {
    pub fn key(provider: &str, transaction_id: &str) -> String {
        format!("{}#{}", provider, transaction_id)
    }
}

/// Result of atomically recording a provider payment against a request
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(PaymentRequest),
    /// The same provider transaction was already recorded
    Duplicate,
    /// The request is no longer active or has no uses left
    LimitReached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        use PaymentStatus::*;
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Paid));
        assert!(Active.can_transition_to(Expired));
        assert!(Active.can_transition_to(Canceled));

        assert!(!Active.can_transition_to(Draft));
        assert!(!Paid.can_transition_to(Active));
        assert!(!Paid.can_transition_to(Canceled));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Canceled.can_transition_to(Active));
        assert!(!Draft.can_transition_to(Paid));
    }

    #[test]
    fn exhausted_active_request_needs_closing() {
        let mut request = PaymentRequest {
            token: "tok".into(),
            owner_id: "owner".into(),
            event_id: None,
            title: "Gift".into(),
            description: None,
            kind: PaymentKind::FixedPayment,
            amount: Some(100.0),
            min_amount: None,
            currency: "ILS".into(),
            fee_mode: FeeMode::default(),
            fee_fixed: 0.0,
            fee_percent: 0.0,
            vat_rate: 0.0,
            usage_limit: 2,
            uses_so_far: 1,
            status: PaymentStatus::Active,
            expires_at: None,
            paid_at: None,
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        };
        assert!(!request.needs_closing());

        request.uses_so_far = 2;
        assert!(request.needs_closing());

        request.status = PaymentStatus::Paid;
        assert!(!request.needs_closing());
    }

    #[test]
    fn kinds_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&PaymentKind::OpenGift).unwrap(),
            "\"open-gift\""
        );
        assert_eq!(serde_json::to_string(&FeeMode::AddOn).unwrap(), "\"add-on\"");
    }
}
