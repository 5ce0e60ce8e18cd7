//! Checkout: store a PENDING order, then open a payment session for it
//!
//! The order row is written before the provider is called so a notification
//! that beats the provider's HTTP response still finds its order.

use crate::database::models::{NewOrder, OrderStatus};
use crate::database::repository::OrderStore;
use crate::error::{AppError, AppResult, CouponRejection, DomainError};
use crate::payments::phone::normalize_phone;
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{CheckoutRequest, CustomerDetails};
use crate::settlement::coupon::CouponService;
use crate::settlement::{reference, validate_amount, validate_customer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the buyer asked to pay for
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutIntent {
    pub customer_name: String,
    pub customer_email: String,
    /// Any format; normalized per provider
    #[serde(default)]
    pub customer_phone: Option<String>,
    /// Whole Rupiah, before any coupon
    pub amount: i64,
    pub product_name: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
    /// Birth data, chart and profile identifiers
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub success: bool,
    pub payment_url: String,
    pub provider_session_id: String,
    pub reference_id: String,
    /// Amount actually charged, after any coupon
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub reference_prefix: String,
    pub return_url: Option<String>,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            reference_prefix: "TB".to_string(),
            return_url: None,
        }
    }
}

pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    coupons: CouponService,
    providers: ProviderRegistry,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        coupons: CouponService,
        providers: ProviderRegistry,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders,
            coupons,
            providers,
            settings,
        }
    }

    pub async fn create_checkout(
        &self,
        provider_name: &str,
        intent: CheckoutIntent,
    ) -> AppResult<CheckoutResult> {
        let provider = self.providers.get_by_name(provider_name)?;

        validate_customer(&intent.customer_name, &intent.customer_email)?;
        if intent.product_name.trim().is_empty() {
            return Err(AppError::missing_field("product_name"));
        }
        validate_amount(intent.amount)?;

        let reference_id = match intent.reference_id {
            Some(reference_id) => {
                reference::validate(&reference_id)?;
                reference_id
            }
            None => reference::generate(&self.settings.reference_prefix),
        };

        let mut metadata = match intent.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            _ => return Err(AppError::validation("metadata", "must be a JSON object")),
        };

        let mut amount = intent.amount;
        if let Some(code) = intent.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
            let coupon = self.coupons.usable(code).await?;
            let discounted = coupon.discount.apply(amount);
            if discounted == 0 {
                return Err(AppError::coupon_rejected(
                    coupon.code,
                    CouponRejection::CoversFullAmount,
                ));
            }
            metadata.insert("coupon_code".to_string(), serde_json::json!(coupon.code));
            metadata.insert("original_amount".to_string(), serde_json::json!(amount));
            amount = discounted;
        }

        let phone = intent
            .customer_phone
            .as_deref()
            .and_then(|raw| normalize_phone(raw, provider.phone_format()));
        let customer = CustomerDetails {
            name: intent.customer_name.trim().to_string(),
            email: intent.customer_email.trim().to_string(),
            phone,
        };

        self.orders
            .insert(NewOrder {
                reference_id: reference_id.clone(),
                customer_name: customer.name.clone(),
                customer_email: customer.email.clone(),
                customer_phone: customer.phone.clone(),
                amount,
                product_name: intent.product_name.clone(),
                metadata: serde_json::Value::Object(metadata),
                status: OrderStatus::Pending,
                payment_provider: Some(provider.name().to_string()),
                payment_method: None,
                paid_at: None,
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    AppError::from(DomainError::DuplicateReference {
                        reference_id: reference_id.clone(),
                    })
                } else {
                    AppError::from(e).with_context("insert pending order")
                }
            })?;

        info!(
            reference_id = %reference_id,
            provider = %provider.name(),
            amount,
            "Pending order stored, opening payment session"
        );

        let request = CheckoutRequest {
            reference_id: reference_id.clone(),
            amount,
            product_name: intent.product_name,
            customer,
            return_url: intent.return_url.or_else(|| self.settings.return_url.clone()),
        };

        let session = provider.create_checkout(&request).await.map_err(|e| {
            if e.is_retryable() {
                warn!(
                    reference_id = %reference_id,
                    provider = %provider.name(),
                    error = %e,
                    "Payment session failed, order left PENDING"
                );
            } else {
                error!(
                    reference_id = %reference_id,
                    provider = %provider.name(),
                    error = %e,
                    "Payment session rejected by provider, order left PENDING"
                );
            }
            e
        })?;

        Ok(CheckoutResult {
            success: true,
            payment_url: session.payment_url,
            provider_session_id: session.session_id,
            reference_id,
            amount,
        })
    }
}
