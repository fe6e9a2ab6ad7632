//! Charge computation for payment requests.
//!
//! The amount a payer is charged is always derived here from the stored
//! request terms. Amounts coming back from the payment provider are only
//! ever compared against this result, never trusted on their own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{parse_timestamp, FeeMode, PaymentKind, PaymentRequest, PaymentStatus};

/// Largest accepted difference between the provider-reported amount and the
/// recomputed charge, in currency units
pub const AMOUNT_TOLERANCE: f64 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum FeeError {
    #[error("A gift amount is required for this payment request")]
    MissingGiftAmount,

    #[error("Amount must be a positive number")]
    InvalidAmount,

    #[error("Gift amount must be at least {0:.2}")]
    BelowMinimum(f64),

    #[error("Payment request is {0}")]
    NotActive(PaymentStatus),

    #[error("Payment request has expired")]
    Expired,

    #[error("Payment request has reached its usage limit")]
    UsageLimitReached,

    #[error("Paid amount {paid:.2} does not match expected amount {expected:.2}")]
    AmountMismatch { expected: f64, paid: f64 },

    #[error("Invalid payment terms: {0}")]
    InvalidTerms(String),
}

/// How the charged amount is made up
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargeBreakdown {
    pub base_amount: f64,
    pub fee_base: f64,
    pub fee_vat: f64,
    pub amount_to_charge: f64,
}

/// Rounds to cents, half away from zero.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // absorbs representation error such as 1.005 * 100 = 100.49999...
    (scaled + scaled.signum() * 1e-7).round() / 100.0
}

fn positive(value: f64) -> Result<f64, FeeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FeeError::InvalidAmount)
    }
}

/// Computes what the payer is charged.
///
/// `gift_amount` is only consulted for open gifts and is ignored for fixed
/// payments.
pub fn compute_charge(
    request: &PaymentRequest,
    gift_amount: Option<f64>,
) -> Result<ChargeBreakdown, FeeError> {
    match request.kind {
        PaymentKind::FixedPayment => {
            let amount = request
                .amount
                .ok_or_else(|| FeeError::InvalidTerms("fixed payment has no amount".into()))
                .and_then(positive)?;
            let amount = round2(amount);
            Ok(ChargeBreakdown {
                base_amount: amount,
                fee_base: 0.0,
                fee_vat: 0.0,
                amount_to_charge: amount,
            })
        }
        PaymentKind::OpenGift => {
            let gift = round2(positive(gift_amount.ok_or(FeeError::MissingGiftAmount)?)?);
            if let Some(min) = request.min_amount {
                if gift < round2(min) {
                    return Err(FeeError::BelowMinimum(min));
                }
            }

            match request.fee_mode {
                FeeMode::Included => Ok(ChargeBreakdown {
                    base_amount: gift,
                    fee_base: 0.0,
                    fee_vat: 0.0,
                    amount_to_charge: gift,
                }),
                FeeMode::AddOn => {
                    let fee_base = round2(request.fee_fixed + gift * request.fee_percent);
                    let fee_vat = round2(fee_base * request.vat_rate);
                    Ok(ChargeBreakdown {
                        base_amount: gift,
                        fee_base,
                        fee_vat,
                        amount_to_charge: round2(gift + fee_base + fee_vat),
                    })
                }
            }
        }
    }
}

/// Checks that a request can currently be paid.
pub fn validate_payable(request: &PaymentRequest, now: DateTime<Utc>) -> Result<(), FeeError> {
    if request.status != PaymentStatus::Active {
        return Err(FeeError::NotActive(request.status));
    }

    if let Some(expires_at) = &request.expires_at {
        // an unreadable expiry fails closed
        match parse_timestamp(expires_at) {
            Some(expiry) if expiry > now => {}
            _ => return Err(FeeError::Expired),
        }
    }

    if request.uses_so_far >= request.usage_limit {
        return Err(FeeError::UsageLimitReached);
    }

    Ok(())
}

/// Recomputes the expected charge and compares it to what the provider reports.
pub fn reconcile(
    request: &PaymentRequest,
    paid_amount: f64,
    gift_amount: Option<f64>,
) -> Result<ChargeBreakdown, FeeError> {
    let expected = compute_charge(request, gift_amount)?;
    if !paid_amount.is_finite()
        || (paid_amount - expected.amount_to_charge).abs() > AMOUNT_TOLERANCE
    {
        return Err(FeeError::AmountMismatch {
            expected: expected.amount_to_charge,
            paid: paid_amount,
        });
    }
    Ok(expected)
}

/// Validates owner-supplied terms before a request is stored.
pub fn validate_terms(request: &PaymentRequest) -> Result<(), FeeError> {
    let invalid = |msg: &str| Err(FeeError::InvalidTerms(msg.to_string()));

    match request.kind {
        PaymentKind::FixedPayment => match request.amount {
            Some(amount) if amount.is_finite() && amount > 0.0 => {}
            _ => return invalid("fixed payments need a positive amount"),
        },
        PaymentKind::OpenGift => {
            if let Some(min) = request.min_amount {
                if !min.is_finite() || min < 0.0 {
                    return invalid("minimum amount cannot be negative");
                }
            }
        }
    }

    if !request.fee_fixed.is_finite() || request.fee_fixed < 0.0 {
        return invalid("fixed fee cannot be negative");
    }
    if !(0.0..=1.0).contains(&request.fee_percent) {
        return invalid("fee percent must be between 0 and 1");
    }
    if !(0.0..=1.0).contains(&request.vat_rate) {
        return invalid("VAT rate must be between 0 and 1");
    }
    if request.usage_limit < 1 {
        return invalid("usage limit must be at least 1");
    }
    if request.uses_so_far > request.usage_limit {
        return invalid("usage limit cannot be below the uses already recorded");
    }
    if request.currency.trim().len() != 3 {
        return invalid("currency must be a three-letter code");
    }
    if let Some(expires_at) = &request.expires_at {
        if parse_timestamp(expires_at).is_none() {
            return invalid("expiry must be an RFC 3339 timestamp");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(kind: PaymentKind, fee_mode: FeeMode) -> PaymentRequest {
        PaymentRequest {
            token: "tok".into(),
            owner_id: "owner".into(),
            event_id: None,
            title: "Gift for Dana & Yoni".into(),
            description: None,
            kind,
            amount: None,
            min_amount: None,
            currency: "ILS".into(),
            fee_mode,
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

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-1.005), -1.01);
        assert_eq!(round2(0.63), 0.63);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn fixed_payment_ignores_fees() {
        let mut req = request(PaymentKind::FixedPayment, FeeMode::AddOn);
        req.amount = Some(100.0);

        let charge = compute_charge(&req, Some(5000.0)).unwrap();
        assert!(close(charge.amount_to_charge, 100.0));
        assert!(close(charge.fee_base, 0.0));
        assert!(close(charge.fee_vat, 0.0));
    }

    #[test]
    fn gift_add_on_worked_example() {
        let req = request(PaymentKind::OpenGift, FeeMode::AddOn);

        let charge = compute_charge(&req, Some(50.0)).unwrap();
        assert!(close(charge.fee_base, 3.5));
        assert!(close(charge.fee_vat, 0.63));
        assert!(close(charge.amount_to_charge, 54.13));
    }

    #[test]
    fn gift_included_charges_gift_amount() {
        let req = request(PaymentKind::OpenGift, FeeMode::Included);

        let charge = compute_charge(&req, Some(250.456)).unwrap();
        assert!(close(charge.amount_to_charge, 250.46));
        assert!(close(charge.fee_base, 0.0));
    }

    #[test]
    fn gift_add_on_matches_closed_form() {
        let mut req = request(PaymentKind::OpenGift, FeeMode::AddOn);
        for (fixed, percent, vat) in [(0.0, 0.0, 0.0), (1.5, 0.025, 0.17), (3.0, 0.1, 0.2)] {
            req.fee_fixed = fixed;
            req.fee_percent = percent;
            req.vat_rate = vat;
            for gift in [1.0, 18.0, 99.99, 360.0, 1234.56] {
                let charge = compute_charge(&req, Some(gift)).unwrap();
                let closed = round2(gift + round2(fixed + gift * percent) * (1.0 + vat));
                assert!(
                    (charge.amount_to_charge - closed).abs() <= 0.01 + 1e-9,
                    "gift={} fixed={} percent={} vat={}: {} vs {}",
                    gift,
                    fixed,
                    percent,
                    vat,
                    charge.amount_to_charge,
                    closed
                );
            }
        }
    }

    #[test]
    fn gift_requires_amount_above_minimum() {
        let mut req = request(PaymentKind::OpenGift, FeeMode::Included);
        req.min_amount = Some(100.0);

        assert_eq!(
            compute_charge(&req, Some(99.99)),
            Err(FeeError::BelowMinimum(100.0))
        );
        assert!(compute_charge(&req, Some(100.0)).is_ok());
        assert_eq!(compute_charge(&req, None), Err(FeeError::MissingGiftAmount));
        assert_eq!(compute_charge(&req, Some(-5.0)), Err(FeeError::InvalidAmount));
        assert_eq!(
            compute_charge(&req, Some(f64::NAN)),
            Err(FeeError::InvalidAmount)
        );
    }

    #[test]
    fn payable_checks_status_expiry_and_uses() {
        let now = Utc::now();
        let mut req = request(PaymentKind::OpenGift, FeeMode::Included);
        assert!(validate_payable(&req, now).is_ok());

        req.status = PaymentStatus::Draft;
        assert_eq!(
            validate_payable(&req, now),
            Err(FeeError::NotActive(PaymentStatus::Draft))
        );

        req.status = PaymentStatus::Active;
        req.expires_at = Some((now - Duration::minutes(1)).to_rfc3339());
        assert_eq!(validate_payable(&req, now), Err(FeeError::Expired));

        req.expires_at = Some("not a date".into());
        assert_eq!(validate_payable(&req, now), Err(FeeError::Expired));

        req.expires_at = Some((now + Duration::days(1)).to_rfc3339());
        req.uses_so_far = 1;
        assert_eq!(validate_payable(&req, now), Err(FeeError::UsageLimitReached));
    }

    #[test]
    fn reconcile_accepts_within_tolerance_only() {
        let req = request(PaymentKind::OpenGift, FeeMode::AddOn);

        assert!(reconcile(&req, 54.13, Some(50.0)).is_ok());
        assert!(reconcile(&req, 54.6, Some(50.0)).is_ok());
        assert!(reconcile(&req, 53.7, Some(50.0)).is_ok());

        match reconcile(&req, 55.0, Some(50.0)) {
            Err(FeeError::AmountMismatch { expected, paid }) => {
                assert!(close(expected, 54.13));
                assert!(close(paid, 55.0));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert_eq!(
            reconcile(&req, 54.13, None),
            Err(FeeError::MissingGiftAmount)
        );
    }

    #[test]
    fn terms_validation() {
        let mut req = request(PaymentKind::FixedPayment, FeeMode::Included);
        assert!(matches!(validate_terms(&req), Err(FeeError::InvalidTerms(_))));

        req.amount = Some(120.0);
        assert!(validate_terms(&req).is_ok());

        req.fee_percent = 1.5;
        assert!(validate_terms(&req).is_err());
        req.fee_percent = 0.03;

        req.usage_limit = 0;
        assert!(validate_terms(&req).is_err());
        req.usage_limit = 1;

        req.currency = "shekel".into();
        assert!(validate_terms(&req).is_err());
    }
}
