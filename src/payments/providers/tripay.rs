//! Tripay closed-payment provider implementation
//!
//! Transactions carry an HMAC-SHA-256 `signature` over merchant code,
//! merchant reference and amount. Callbacks are signed over the raw body and
//! delivered with `X-Callback-Signature` / `X-Callback-Event` headers.

use crate::error::{AppError, AppResult};
use crate::payments::http::{unexpected_status, ProviderHttp};
use crate::payments::signature::{tripay_checkout_signature, verify_tripay_callback, SignatureError};
use crate::payments::traits::{PaymentProvider, WebhookError};
use crate::payments::types::{
    CheckoutRequest, PaymentEvent, PaymentOutcome, PaymentSession, PhoneFormat, ProviderName,
    ReportedAmount, WebhookRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{error, info};

pub const SANDBOX_BASE_URL: &str = "https://tripay.co.id/api-sandbox";
pub const PRODUCTION_BASE_URL: &str = "https://tripay.co.id/api";

const CREATE_PATH: &str = "/transaction/create";
const PROVIDER: &str = "Tripay";

const HEADER_CALLBACK_SIGNATURE: &str = "X-Callback-Signature";
const HEADER_CALLBACK_EVENT: &str = "X-Callback-Event";
const PAYMENT_STATUS_EVENT: &str = "payment_status";

/// Tripay payment provider configuration
#[derive(Debug, Clone)]
pub struct TripayConfig {
    pub api_key: String,
    /// Signs transactions and callbacks
    pub private_key: String,
    pub merchant_code: String,
    pub base_url: String,
    /// Payment channel code, e.g. `QRIS` or `BRIVA`
    pub default_method: String,
    /// Hours before an unpaid transaction expires
    pub expiry_hours: i64,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for TripayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            private_key: String::new(),
            merchant_code: String::new(),
            base_url: SANDBOX_BASE_URL.to_string(),
            default_method: "QRIS".to_string(),
            expiry_hours: 24,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Tripay payment provider
pub struct TripayProvider {
    config: TripayConfig,
    http: ProviderHttp,
}

impl TripayProvider {
    pub fn new(config: TripayConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(config.timeout_secs, config.max_retries)?;
        Ok(Self { config, http })
    }
}

/// Map a Tripay callback `status` onto an outcome
pub fn map_status(status: &str) -> PaymentOutcome {
    match status.to_ascii_uppercase().as_str() {
        "PAID" => PaymentOutcome::Success,
        "EXPIRED" | "FAILED" | "REFUND" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Pending,
    }
}

#[async_trait]
impl PaymentProvider for TripayProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Tripay
    }

    fn phone_format(&self) -> PhoneFormat {
        PhoneFormat::National
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<PaymentSession> {
        info!(
            reference_id = %request.reference_id,
            amount = request.amount,
            method = %self.config.default_method,
            "Creating Tripay transaction"
        );

        let signature = tripay_checkout_signature(
            &self.config.merchant_code,
            &request.reference_id,
            request.amount,
            &self.config.private_key,
        );
        let expired_time = (Utc::now() + Duration::hours(self.config.expiry_hours)).timestamp();

        let mut payload = serde_json::json!({
            "method": self.config.default_method,
            "merchant_ref": request.reference_id,
            "amount": request.amount,
            "customer_name": request.customer.name,
            "customer_email": request.customer.email,
            "order_items": [{
                "name": request.product_name,
                "price": request.amount,
                "quantity": 1,
            }],
            "expired_time": expired_time,
            "signature": signature,
        });

        if let Some(phone) = &request.customer.phone {
            payload["customer_phone"] = serde_json::Value::String(phone.clone());
        }

        if let Some(return_url) = &request.return_url {
            payload["return_url"] = serde_json::Value::String(return_url.clone());
        }

        let url = format!("{}{}", self.config.base_url, CREATE_PATH);
        let builder = self
            .http
            .client()
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload);

        let response = self.http.send(PROVIDER, builder).await?;
        if !response.status.is_success() {
            return Err(unexpected_status(PROVIDER, &response));
        }

        let envelope: TripayResponse<TripayTransaction> = response.json(PROVIDER)?;
        let transaction = match (envelope.success, envelope.data) {
            (true, Some(data)) => data,
            (_, _) => {
                error!(message = %envelope.message, "Tripay API error");
                return Err(AppError::provider(PROVIDER, envelope.message, false));
            }
        };

        info!(
            reference_id = %request.reference_id,
            tripay_reference = %transaction.reference,
            "Tripay transaction created"
        );

        Ok(PaymentSession {
            payment_url: transaction.checkout_url,
            session_id: transaction.reference,
        })
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let signature = request
            .header(HEADER_CALLBACK_SIGNATURE)
            .ok_or_else(|| SignatureError::missing(HEADER_CALLBACK_SIGNATURE))?;
        verify_tripay_callback(&request.body, &self.config.private_key, signature)?;

        match request.header(HEADER_CALLBACK_EVENT) {
            Some(PAYMENT_STATUS_EVENT) => {}
            other => {
                return Err(WebhookError::malformed(format!(
                    "unsupported callback event {:?}",
                    other
                )))
            }
        }

        let callback: TripayCallback = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(format!("invalid callback body: {}", e)))?;
        let raw_payload = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(e.to_string()))?;

        let settled_at = callback
            .paid_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        let amount = callback.order_amount();

        Ok(PaymentEvent {
            provider: ProviderName::Tripay,
            provider_transaction_id: callback.reference,
            order_reference_id: callback.merchant_ref,
            outcome: map_status(&callback.status),
            amount,
            payment_method_label: callback.payment_method_code.or(callback.payment_method),
            settled_at,
            raw_payload,
        })
    }

    fn recognizes(&self, request: &WebhookRequest) -> bool {
        request.header(HEADER_CALLBACK_SIGNATURE).is_some()
    }
}

// Tripay API response wrapper
#[derive(Debug, Deserialize)]
struct TripayResponse<T> {
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

// Closed transaction response
#[derive(Debug, Deserialize)]
struct TripayTransaction {
    reference: String,
    checkout_url: String,
}

// Payment status callback
#[derive(Debug, Deserialize)]
struct TripayCallback {
    #[serde(default)]
    reference: Option<String>,
    merchant_ref: String,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    payment_method_code: Option<String>,
    /// What the buyer paid, including `fee_customer`
    #[serde(default)]
    total_amount: Option<serde_json::Value>,
    /// Channel fee passed on to the buyer
    #[serde(default)]
    fee_customer: Option<serde_json::Value>,
    status: String,
    #[serde(default)]
    paid_at: Option<i64>,
}

impl TripayCallback {
    /// Order amount: `total_amount` less the fee charged to the buyer
    fn order_amount(&self) -> Option<ReportedAmount> {
        let total = ReportedAmount::from_json(self.total_amount.as_ref()?)?;
        let fee = self
            .fee_customer
            .as_ref()
            .and_then(ReportedAmount::from_json)
            .unwrap_or(ReportedAmount::Whole(0));

        match (&total, &fee) {
            (ReportedAmount::Whole(total), ReportedAmount::Whole(fee)) => Some(
                total
                    .checked_sub(*fee)
                    .map(ReportedAmount::Whole)
                    .unwrap_or_else(|| ReportedAmount::Unreadable(format!("{} - {}", total, fee))),
            ),
            _ => Some(ReportedAmount::Unreadable(format!(
                "total_amount={} fee_customer={}",
                total, fee
            ))),
        }
    }
}
