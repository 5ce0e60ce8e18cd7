//! Coupon eligibility, price preview and zero-cost redemption
//!
//! A free coupon skips the payment providers entirely: the order is written
//! as PAID in a single insert and fulfillment is emitted once.
//!
//! The usage cap is checked before the order insert and the counter is bumped
//! afterwards, as two separate writes. Concurrent redemptions of a nearly
//! exhausted coupon can overshoot `max_uses` by the number of racing callers.

use crate::database::models::{Coupon, NewOrder, Order, OrderStatus};
use crate::database::repository::{CouponStore, OrderStore};
use crate::error::{AppError, AppResult, CouponRejection, DomainError};
use crate::settlement::fulfillment::FulfillmentDispatcher;
use crate::settlement::{reference, validate_amount, validate_customer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const COUPON_PAYMENT_METHOD: &str = "coupon";

/// Check that a looked-up coupon may be used right now
pub fn ensure_usable(code: &str, coupon: Option<Coupon>, now: DateTime<Utc>) -> AppResult<Coupon> {
    let coupon = coupon.ok_or_else(|| AppError::coupon_rejected(code, CouponRejection::NotFound))?;

    if !coupon.is_active {
        return Err(AppError::coupon_rejected(code, CouponRejection::Inactive));
    }
    if coupon.is_expired(now) {
        return Err(AppError::coupon_rejected(code, CouponRejection::Expired));
    }
    if coupon.is_exhausted() {
        return Err(AppError::coupon_rejected(code, CouponRejection::Exhausted));
    }
    Ok(coupon)
}

/// Codes are matched case-insensitively and stored upper-case
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CouponPreview {
    pub code: String,
    pub discount_type: String,
    pub discount_value: i64,
    pub original_amount: i64,
    pub final_amount: i64,
    /// The final price is zero; use redemption instead of checkout
    pub is_free: bool,
}

/// Read-only coupon lookups
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponStore>,
}

impl CouponService {
    pub fn new(coupons: Arc<dyn CouponStore>) -> Self {
        Self { coupons }
    }

    /// Load a coupon and check it is currently usable
    pub async fn usable(&self, code: &str) -> AppResult<Coupon> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(AppError::missing_field("coupon_code"));
        }
        let coupon = self.coupons.find_by_code(&code).await?;
        ensure_usable(&code, coupon, Utc::now())
    }

    /// Price after applying `code` to `amount`. Does not consume a use.
    pub async fn preview(&self, code: &str, amount: i64) -> AppResult<CouponPreview> {
        validate_amount(amount)?;
        let coupon = self.usable(code).await?;
        let final_amount = coupon.discount.apply(amount);

        Ok(CouponPreview {
            code: coupon.code,
            discount_type: coupon.discount.type_name().to_string(),
            discount_value: coupon.discount.value(),
            original_amount: amount,
            final_amount,
            is_free: final_amount == 0,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionRequest {
    pub coupon_code: String,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub product_name: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionResult {
    pub success: bool,
    pub reference_id: String,
    pub order: Order,
}

/// Creates already-paid orders from full-free coupons
pub struct CouponRedemptionService {
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderStore>,
    fulfillment: Arc<dyn FulfillmentDispatcher>,
    lookup: CouponService,
    reference_prefix: String,
}

impl CouponRedemptionService {
    pub fn new(
        coupons: Arc<dyn CouponStore>,
        orders: Arc<dyn OrderStore>,
        fulfillment: Arc<dyn FulfillmentDispatcher>,
        reference_prefix: impl Into<String>,
    ) -> Self {
        Self {
            lookup: CouponService::new(coupons.clone()),
            coupons,
            orders,
            fulfillment,
            reference_prefix: reference_prefix.into(),
        }
    }

    pub async fn redeem(&self, request: RedemptionRequest) -> AppResult<RedemptionResult> {
        validate_customer(&request.customer_name, &request.customer_email)?;
        if request.product_name.trim().is_empty() {
            return Err(AppError::missing_field("product_name"));
        }

        let coupon = self.lookup.usable(&request.coupon_code).await?;
        if !coupon.discount.is_free() {
            return Err(AppError::coupon_rejected(
                coupon.code,
                CouponRejection::NotFreeRedeemable,
            ));
        }

        let reference_id = match request.reference_id {
            Some(reference_id) => {
                reference::validate(&reference_id)?;
                reference_id
            }
            None => reference::generate(&self.reference_prefix),
        };

        let mut metadata = match request.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            _ => return Err(AppError::validation("metadata", "must be a JSON object")),
        };
        metadata.insert("coupon_code".to_string(), serde_json::json!(coupon.code));

        let order = self
            .orders
            .insert(NewOrder {
                reference_id: reference_id.clone(),
                customer_name: request.customer_name.trim().to_string(),
                customer_email: request.customer_email.trim().to_string(),
                customer_phone: request.customer_phone,
                amount: 0,
                product_name: request.product_name,
                metadata: serde_json::Value::Object(metadata),
                status: OrderStatus::Paid,
                payment_provider: Some(COUPON_PAYMENT_METHOD.to_string()),
                payment_method: Some(COUPON_PAYMENT_METHOD.to_string()),
                paid_at: Some(Utc::now()),
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    AppError::from(DomainError::DuplicateReference {
                        reference_id: reference_id.clone(),
                    })
                } else {
                    AppError::from(e).with_context("insert redeemed order")
                }
            })?;

        match self.coupons.increment_usage(&coupon.code).await {
            Ok(updated) if updated.current_uses > updated.max_uses => warn!(
                code = %updated.code,
                current_uses = updated.current_uses,
                max_uses = updated.max_uses,
                "Coupon usage overshot its cap under concurrent redemption"
            ),
            Ok(_) => {}
            Err(e) => error!(
                code = %coupon.code,
                reference_id = %reference_id,
                error = %e,
                "Failed to count coupon use for redeemed order"
            ),
        }

        info!(
            code = %coupon.code,
            reference_id = %reference_id,
            "Coupon redeemed, order created as PAID"
        );
        self.fulfillment.emit(&order);

        Ok(RedemptionResult {
            success: true,
            reference_id,
            order,
        })
    }
}
