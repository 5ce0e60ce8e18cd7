//! DOKU Checkout payment provider implementation
//!
//! Every request and notification is signed with HMAC-SHA-256 over a block of
//! `Client-Id`, `Request-Id`, `Request-Timestamp`, `Request-Target` and the
//! body `Digest`, sent as `Signature: HMACSHA256=<base64>`.

use crate::error::{AppError, AppResult};
use crate::payments::http::{unexpected_status, ProviderHttp};
use crate::payments::signature::{
    doku_digest, doku_signature, verify_doku_signature, DokuSignatureComponents, SignatureError,
    DOKU_SIGNATURE_PREFIX,
};
use crate::payments::traits::{PaymentProvider, WebhookError};
use crate::payments::types::{
    CheckoutRequest, PaymentEvent, PaymentOutcome, PaymentSession, PhoneFormat, ProviderName,
    ReportedAmount, WebhookRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

pub const SANDBOX_BASE_URL: &str = "https://api-sandbox.doku.com";
pub const PRODUCTION_BASE_URL: &str = "https://api.doku.com";

const CHECKOUT_PATH: &str = "/checkout/v1/payment";
const PROVIDER: &str = "DOKU";

const HEADER_CLIENT_ID: &str = "Client-Id";
const HEADER_REQUEST_ID: &str = "Request-Id";
const HEADER_REQUEST_TIMESTAMP: &str = "Request-Timestamp";
const HEADER_SIGNATURE: &str = "Signature";

/// DOKU payment provider configuration
#[derive(Debug, Clone)]
pub struct DokuConfig {
    pub client_id: String,
    pub secret_key: String,
    pub base_url: String,
    /// Path DOKU posts notifications to; part of the signed block
    pub notification_target: String,
    /// Minutes the hosted payment page stays payable
    pub payment_due_minutes: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DokuConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            secret_key: String::new(),
            base_url: SANDBOX_BASE_URL.to_string(),
            notification_target: "/webhooks/doku".to_string(),
            payment_due_minutes: 60,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// DOKU payment provider
pub struct DokuProvider {
    config: DokuConfig,
    http: ProviderHttp,
}

impl DokuProvider {
    pub fn new(config: DokuConfig) -> AppResult<Self> {
        let http = ProviderHttp::new(config.timeout_secs, config.max_retries)?;
        Ok(Self { config, http })
    }
}

/// Map DOKU `transaction.status` onto an outcome
pub fn map_transaction_status(status: &str) -> PaymentOutcome {
    match status.to_ascii_uppercase().as_str() {
        "SUCCESS" => PaymentOutcome::Success,
        "FAILED" | "EXPIRED" => PaymentOutcome::Failed,
        _ => PaymentOutcome::Pending,
    }
}

fn required_header<'a>(request: &'a WebhookRequest, name: &str) -> Result<&'a str, SignatureError> {
    request
        .header(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SignatureError::missing(name))
}

#[async_trait]
impl PaymentProvider for DokuProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Doku
    }

    fn phone_format(&self) -> PhoneFormat {
        PhoneFormat::International
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> AppResult<PaymentSession> {
        info!(
            reference_id = %request.reference_id,
            amount = request.amount,
            "Creating DOKU checkout payment"
        );

        let mut payload = serde_json::json!({
            "order": {
                "amount": request.amount,
                "invoice_number": request.reference_id,
                "line_items": [{
                    "name": request.product_name,
                    "price": request.amount,
                    "quantity": 1,
                }],
            },
            "payment": {
                "payment_due_date": self.config.payment_due_minutes,
            },
            "customer": {
                "name": request.customer.name,
                "email": request.customer.email,
            },
        });

        if let Some(phone) = &request.customer.phone {
            payload["customer"]["phone"] = serde_json::Value::String(phone.clone());
        }

        if let Some(return_url) = &request.return_url {
            payload["order"]["callback_url"] = serde_json::Value::String(return_url.clone());
        }

        // The digest covers the exact bytes sent, so serialize once.
        let body = serde_json::to_string(&payload)
            .map_err(|e| AppError::provider(PROVIDER, e.to_string(), false))?;
        let request_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let digest = doku_digest(body.as_bytes());
        let signature = doku_signature(
            &DokuSignatureComponents {
                client_id: &self.config.client_id,
                request_id: &request_id,
                request_timestamp: &timestamp,
                request_target: CHECKOUT_PATH,
                digest: Some(&digest),
            },
            &self.config.secret_key,
        );

        let url = format!("{}{}", self.config.base_url, CHECKOUT_PATH);
        let builder = self
            .http
            .client()
            .post(&url)
            .header(HEADER_CLIENT_ID, &self.config.client_id)
            .header(HEADER_REQUEST_ID, &request_id)
            .header(HEADER_REQUEST_TIMESTAMP, &timestamp)
            .header(HEADER_SIGNATURE, &signature)
            .header("Content-Type", "application/json")
            .body(body);

        let response = self.http.send(PROVIDER, builder).await?;
        if !response.status.is_success() {
            return Err(unexpected_status(PROVIDER, &response));
        }

        let checkout: DokuCheckoutResponse = response.json(PROVIDER)?;
        let payment = checkout.response.payment;

        info!(
            reference_id = %request.reference_id,
            token_id = %payment.token_id,
            request_id = %request_id,
            "DOKU checkout payment created"
        );

        Ok(PaymentSession {
            payment_url: payment.url,
            session_id: payment.token_id,
        })
    }

    fn parse_webhook(&self, request: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let client_id = required_header(request, HEADER_CLIENT_ID)?;
        let request_id = required_header(request, HEADER_REQUEST_ID)?;
        let timestamp = required_header(request, HEADER_REQUEST_TIMESTAMP)?;
        let signature = required_header(request, HEADER_SIGNATURE)?;

        if client_id != self.config.client_id {
            return Err(SignatureError::Mismatch {
                provider: "doku".to_string(),
            }
            .into());
        }

        let digest = doku_digest(&request.body);
        verify_doku_signature(
            &DokuSignatureComponents {
                client_id,
                request_id,
                request_timestamp: timestamp,
                request_target: &self.config.notification_target,
                digest: Some(&digest),
            },
            &self.config.secret_key,
            signature,
        )?;

        let notification: DokuNotification = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(format!("invalid notification body: {}", e)))?;
        let raw_payload = serde_json::from_slice(&request.body)
            .map_err(|e| WebhookError::malformed(e.to_string()))?;

        let settled_at = notification
            .transaction
            .date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));

        let payment_method_label = notification
            .channel
            .map(|c| c.id)
            .or(notification.service.map(|s| s.id));

        Ok(PaymentEvent {
            provider: ProviderName::Doku,
            provider_transaction_id: notification
                .transaction
                .original_request_id
                .or_else(|| Some(request_id.to_string())),
            order_reference_id: notification.order.invoice_number,
            outcome: map_transaction_status(&notification.transaction.status),
            amount: notification.order.amount.as_ref().and_then(ReportedAmount::from_json),
            payment_method_label,
            settled_at,
            raw_payload,
        })
    }

    fn recognizes(&self, request: &WebhookRequest) -> bool {
        request.header(HEADER_CLIENT_ID).is_some()
            && request
                .header(HEADER_SIGNATURE)
                .map(|s| s.starts_with(DOKU_SIGNATURE_PREFIX))
                .unwrap_or(false)
    }
}

// Checkout response
#[derive(Debug, Deserialize)]
struct DokuCheckoutResponse {
    response: DokuCheckoutBody,
}

#[derive(Debug, Deserialize)]
struct DokuCheckoutBody {
    payment: DokuPaymentPage,
}

#[derive(Debug, Deserialize)]
struct DokuPaymentPage {
    url: String,
    token_id: String,
}

// HTTP notification body
#[derive(Debug, Deserialize)]
struct DokuNotification {
    order: DokuNotificationOrder,
    transaction: DokuNotificationTransaction,
    #[serde(default)]
    channel: Option<DokuIdentifier>,
    #[serde(default)]
    service: Option<DokuIdentifier>,
}

#[derive(Debug, Deserialize)]
struct DokuNotificationOrder {
    invoice_number: String,
    #[serde(default)]
    amount: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DokuNotificationTransaction {
    status: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    original_request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DokuIdentifier {
    id: String,
}
