//! Midtrans Snap payment provider implementation
//!
//! Checkout opens a Snap session (`POST /snap/v1/transactions`, HTTP Basic
//! auth with the server key). Notifications are JSON and carry a
//! `signature_key` computed as SHA-512 over order id, status code, gross
//! amount and the server key.

use crate::error::AppResult;
use crate::payments::http::{unexpected_status, ProviderHttp};
use crate::payments::signature::verify_midtrans_signature;
use crate::payments::traits::{PaymentProvider, WebhookError};
use crate::payments::types::{
    CheckoutRequest, PaymentEvent, PaymentOutcome, PaymentSession,
    PhoneFormat, ProviderName, ReportedAmount, WebhookRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{info, warn};

pub const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";
pub const PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

const SNAP_PATH: &str = "/snap/v1/transactions";
const PROVIDER: &str = "Midtrans";
/// Midtrans timestamps are Asia/Jakarta local time
const JAKARTA_OFFSET_SECS: i32 = 7 * 3600;
/// Snap rejects item names longer than this
const MAX_ITEM_NAME_LEN: usize = 50;

/// Midtrans payment provider configuration
#[derive(Debug, Clone)]
pub struct MidtransConfig {
    /// Server key, used for Basic auth and notification signatures
    pub server_key: String,
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of retries for rate-limited or failed requests
    pub max_retries: u32,
}

impl Default for MidtransConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            base_url: SANDBOX_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Midtrans payment provider
pub struct MidtransProvider {
    config: MidtransConfig,
    http: ProviderHttp,
}

impl MidtransProvider {
    pub fn new(config: MidtransConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(config.timeout_secs, config.max_retries)?;
        Ok(Self { config, http })
    }
}

/// Map Midtrans `transaction_status` / `fraud_status` onto an outcome.
///
/// A `deny` fraud verdict wins over any transaction status.
pub fn map_transaction_status(transaction_status: &str, fraud_status: Option<&str>) -> PaymentOutcome {
    if fraud_status == Some("deny") {
        return PaymentOutcome::Failed;
    }

    match transaction_status {
        "capture" => match fraud_status {
            Some("challenge") => PaymentOutcome::Pending,
            _ => PaymentOutcome::Success,
        },
        "settlement" => PaymentOutcome::Success,
        "pending" | "authorize" => PaymentOutcome::Pending,
        "deny" | "cancel" | "expire" | "failure" | "refund" | "partial_refund" | "chargeback"
        | "partial_chargeback" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Pending,
    }
}

fn parse_jakarta_time(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(JAKARTA_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[async_trait]
impl PaymentProvider for MidtransProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Midtrans
    }

    fn phone_format(&self) -> PhoneFormat {
        PhoneFormat::National
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<PaymentSession> {
        info!(
            reference_id = %request.reference_id,
            amount = request.amount,
            "Creating Midtrans Snap transaction"
        );

        let mut payload = serde_json::json!({
            "transaction_details": {
                "order_id": request.reference_id,
                "gross_amount": request.amount,
            },
            "item_details": [{
                "id": request.reference_id,
                "price": request.amount,
                "quantity": 1,
                "name": truncate_chars(&request.product_name, MAX_ITEM_NAME_LEN),
            }],
            "customer_details": {
                "first_name": request.customer.name,
                "email": request.customer.email,
            },
        });

        if let Some(phone) = &request.customer.phone {
            payload["customer_details"]["phone"] = serde_json::Value::String(phone.clone());
        }

        if let Some(return_url) = &request.return_url {
            payload["callbacks"] = serde_json::json!({ "finish": return_url });
        }

        let url = format!("{}{}", self.config.base_url, SNAP_PATH);
        let builder = self
            .http
            .client()
            .post(&url)
            .basic_auth(&self.config.server_key, Some(""))
            .header("Accept", "application/json")
            .json(&payload);

        let response = self.http.send(PROVIDER, builder).await?;
        if !response.status.is_success() {
            return Err(unexpected_status(PROVIDER, &response));
        }

        let snap: SnapResponse = response.json(PROVIDER)?;

        info!(
            reference_id = %request.reference_id,
            token = %snap.token,
            "Midtrans Snap transaction created"
        );

        Ok(PaymentSession {
            payment_url: snap.redirect_url,
            session_id: snap.token,
        })
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let notification: MidtransNotification = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(format!("invalid notification body: {}", e)))?;

        verify_midtrans_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            &self.config.server_key,
            &notification.signature_key,
        )?;

        let outcome = map_transaction_status(
            &notification.transaction_status,
            notification.fraud_status.as_deref(),
        );

        let amount = ReportedAmount::parse(&notification.gross_amount);
        if amount.whole().is_none() {
            warn!(
                order_id = %notification.order_id,
                gross_amount = %notification.gross_amount,
                "Midtrans gross_amount is not a whole Rupiah value"
            );
        }

        let settled_at = notification
            .settlement_time
            .as_deref()
            .or(notification.transaction_time.as_deref())
            .and_then(parse_jakarta_time);

        let raw_payload = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(e.to_string()))?;

        Ok(PaymentEvent {
            provider: ProviderName::Midtrans,
            provider_transaction_id: notification.transaction_id,
            order_reference_id: notification.order_id,
            outcome,
            amount: Some(amount),
            payment_method_label: notification.payment_type,
            settled_at,
            raw_payload,
        })
    }

    fn recognizes(&self, request: &WebhookRequest) -> bool {
        serde_json::from_slice::<serde_json::Value>(&request.body)
            .map(|body| body.get("signature_key").is_some() && body.get("transaction_status").is_some())
            .unwrap_or(false)
    }
}

// Snap transaction response
#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

// HTTP notification body
#[derive(Debug, Deserialize)]
struct MidtransNotification {
    order_id: String,
    status_code: String,
    gross_amount: String,
    #[serde(default)]
    signature_key: String,
    transaction_status: String,
    #[serde(default)]
    fraud_status: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    payment_type: Option<String>,
    #[serde(default)]
    transaction_time: Option<String>,
    #[serde(default)]
    settlement_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::signature::{midtrans_signature, SignatureError};
    use axum::http::HeaderMap;
    use chrono::Timelike;

    const SERVER_KEY: &str = "SB-Mid-server-test";

    fn create_test_provider() -> MidtransProvider {
        MidtransProvider::new(MidtransConfig {
            server_key: SERVER_KEY.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn notification(status: &str, fraud: Option<&str>, signature: Option<String>) -> WebhookRequest {
        let signature = signature
            .unwrap_or_else(|| midtrans_signature("TB-TEST-1", "200", "249000.00", SERVER_KEY));
        let mut body = serde_json::json!({
            "order_id": "TB-TEST-1",
            "status_code": "200",
            "gross_amount": "249000.00",
            "signature_key": signature,
            "transaction_status": status,
            "transaction_id": "9aed5972-5b6a-401e-894b-a32c91ed1a3a",
            "payment_type": "qris",
            "transaction_time": "2024-06-01 16:59:00",
            "settlement_time": "2024-06-01 17:00:00",
        });
        if let Some(fraud) = fraud {
            body["fraud_status"] = serde_json::Value::String(fraud.to_string());
        }
        WebhookRequest::new(HeaderMap::new(), serde_json::to_vec(&body).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_transaction_status("settlement", None), PaymentOutcome::Success);
        assert_eq!(map_transaction_status("capture", Some("accept")), PaymentOutcome::Success);
        assert_eq!(map_transaction_status("capture", Some("challenge")), PaymentOutcome::Pending);
        assert_eq!(map_transaction_status("pending", None), PaymentOutcome::Pending);
        assert_eq!(map_transaction_status("expire", None), PaymentOutcome::Failed);
        assert_eq!(map_transaction_status("cancel", None), PaymentOutcome::Failed);
        assert_eq!(map_transaction_status("something_new", None), PaymentOutcome::Pending);
    }

    #[test]
    fn test_fraud_deny_forces_failure() {
        assert_eq!(map_transaction_status("settlement", Some("deny")), PaymentOutcome::Failed);
        assert_eq!(map_transaction_status("capture", Some("deny")), PaymentOutcome::Failed);
    }

    #[test]
    fn test_parse_settlement_notification() {
        let provider = create_test_provider();
        let event = provider.parse_webhook(&notification("settlement", Some("accept"), None)).unwrap();

        assert_eq!(event.provider, ProviderName::Midtrans);
        assert_eq!(event.order_reference_id, "TB-TEST-1");
        assert_eq!(event.outcome, PaymentOutcome::Success);
        assert_eq!(event.amount, Some(ReportedAmount::Whole(249_000)));
        assert_eq!(event.payment_method_label.as_deref(), Some("qris"));
        // 17:00 WIB is 10:00 UTC
        assert_eq!(event.settled_at.unwrap().hour(), 10);
        assert_eq!(event.raw_payload["transaction_status"], "settlement");
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let provider = create_test_provider();
        let mut signature = midtrans_signature("TB-TEST-1", "200", "249000.00", SERVER_KEY);
        let last = signature.pop().unwrap();
        signature.push(if last == '0' { '1' } else { '0' });

        let result = provider.parse_webhook(&notification("settlement", None, Some(signature)));
        assert!(matches!(
            result,
            Err(WebhookError::Signature(SignatureError::Mismatch { .. }))
        ));
    }

    #[test]
    fn test_malformed_body() {
        let provider = create_test_provider();
        let request = WebhookRequest::new(HeaderMap::new(), "not json");
        assert!(matches!(provider.parse_webhook(&request), Err(WebhookError::Malformed(_))));
        assert!(!provider.recognizes(&request));
    }

    #[test]
    fn test_recognizes_notification_shape() {
        let provider = create_test_provider();
        assert!(provider.recognizes(&notification("pending", None, None)));
    }

    #[test]
    fn test_parse_jakarta_time() {
        let parsed = parse_jakarta_time("2024-06-01 07:00:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert!(parse_jakarta_time("yesterday").is_none());
    }
}
