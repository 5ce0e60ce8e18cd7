//! Order settlement
//!
//! Checkout, notification handling, reconciliation, coupon redemption and
//! fulfillment dispatch. Everything here works against the store traits in
//! [`crate::database::repository`], never a concrete database.

pub mod checkout;
pub mod coupon;
pub mod fulfillment;
pub mod reconciler;
pub mod reference;
pub mod webhook;

pub use checkout::{CheckoutIntent, CheckoutResult, CheckoutService, CheckoutSettings};
pub use coupon::{CouponPreview, CouponRedemptionService, CouponService, RedemptionRequest, RedemptionResult};
pub use fulfillment::{FulfillmentDispatcher, FulfillmentPayload, HttpFulfillmentDispatcher};
pub use reconciler::{OrderReconciler, ReconcileOutcome};
pub use webhook::{WebhookAck, WebhookProcessor};

use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

/// Largest order amount accepted, in whole Rupiah
pub const MAX_ORDER_AMOUNT: i64 = 100_000_000_000;

pub(crate) fn validate_amount(amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::validation("amount", "must be a positive whole Rupiah amount"));
    }
    if amount > MAX_ORDER_AMOUNT {
        return Err(AppError::validation(
            "amount",
            format!("must not exceed {} Rupiah", MAX_ORDER_AMOUNT),
        ));
    }
    Ok(())
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

pub(crate) fn validate_customer(name: &str, email: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::missing_field("customer_name"));
    }
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::missing_field("customer_email"));
    }
    if !email_pattern().is_match(email) {
        return Err(AppError::validation("customer_email", "not a valid email address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_customer() {
        assert!(validate_customer("Ayu", "ayu@example.com").is_ok());
        assert!(validate_customer(" ", "ayu@example.com").is_err());
        assert!(validate_customer("Ayu", "").is_err());
        assert!(validate_customer("Ayu", "ayu@localhost").is_err());
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount(1).is_ok());
        assert!(validate_amount(MAX_ORDER_AMOUNT).is_ok());
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-5).is_err());
        assert!(validate_amount(MAX_ORDER_AMOUNT + 1).is_err());
        assert!(validate_amount(i64::MAX).is_err());
    }
}
