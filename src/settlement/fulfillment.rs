//! Fulfillment dispatch
//!
//! Once an order is PAID the downstream automation (report generation,
//! customer notification) is told about it. Delivery is one-way and
//! at-most-once: failures are logged and never touch the order.

use crate::database::models::{Order, ProfileRecord};
use crate::database::repository::ProfileStore;
use crate::error::{AppError, AppResult, ExternalError};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const SERVICE: &str = "fulfillment";

/// One-way notification that an order has been paid
pub trait FulfillmentDispatcher: Send + Sync {
    /// Hand the order off. Returns immediately; the caller never learns
    /// whether delivery succeeded.
    fn emit(&self, order: &Order);
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub reference_id: String,
    pub amount: i64,
    pub status: String,
    pub payment_provider: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentPayload {
    pub order: Order,
    pub associated_records: Vec<ProfileRecord>,
    pub transaction_summary: TransactionSummary,
}

impl FulfillmentPayload {
    pub fn new(order: Order, associated_records: Vec<ProfileRecord>) -> Self {
        let transaction_summary = TransactionSummary {
            reference_id: order.reference_id.clone(),
            amount: order.amount,
            status: order.status.to_string(),
            payment_provider: order.payment_provider.clone(),
            provider_transaction_id: order.provider_transaction_id.clone(),
            payment_method: order.payment_method.clone(),
            paid_at: order.paid_at,
            coupon_code: order.coupon_code().map(str::to_string),
        };
        Self {
            order,
            associated_records,
            transaction_summary,
        }
    }
}

/// Posts the fulfillment payload to the configured automation endpoint
#[derive(Clone)]
pub struct HttpFulfillmentDispatcher {
    client: Client,
    endpoint: Option<String>,
    timeout_secs: u64,
    profiles: Arc<dyn ProfileStore>,
}

impl HttpFulfillmentDispatcher {
    pub fn new(
        endpoint: Option<String>,
        timeout_secs: u64,
        profiles: Arc<dyn ProfileStore>,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("fulfillment HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout_secs,
            profiles,
        })
    }

    /// Deliver synchronously. [`FulfillmentDispatcher::emit`] runs this on a
    /// detached task.
    pub async fn deliver(&self, order: &Order) -> AppResult<()> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => {
                warn!(
                    reference_id = %order.reference_id,
                    "No fulfillment endpoint configured, skipping"
                );
                return Ok(());
            }
        };

        let profile_ids = order.profile_ids();
        let associated_records = match self.profiles.find_by_ids(&profile_ids).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    reference_id = %order.reference_id,
                    error = %e,
                    "Failed to load profile records, sending order without them"
                );
                Vec::new()
            }
        };

        let payload = FulfillmentPayload::new(order.clone(), associated_records);
        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::from(ExternalError::Timeout {
                        service: SERVICE.to_string(),
                        seconds: self.timeout_secs,
                    })
                } else {
                    AppError::provider(SERVICE, e.to_string(), true)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::provider(
                SERVICE,
                format!("HTTP {}: {}", status, body),
                status.is_server_error(),
            ));
        }

        info!(
            reference_id = %order.reference_id,
            records = payload.associated_records.len(),
            "Fulfillment delivered"
        );
        Ok(())
    }
}

impl FulfillmentDispatcher for HttpFulfillmentDispatcher {
    fn emit(&self, order: &Order) {
        let dispatcher = self.clone();
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.deliver(&order).await {
                error!(
                    reference_id = %order.reference_id,
                    error = %e,
                    "Fulfillment delivery failed; order stays PAID, replay manually"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::models::OrderStatus;
    use uuid::Uuid;

    fn paid_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            reference_id: "TB-TEST-1".to_string(),
            customer_name: "Ayu".to_string(),
            customer_email: "ayu@example.com".to_string(),
            customer_phone: None,
            amount: 249_000,
            product_name: "Full Reading".to_string(),
            metadata: serde_json::json!({ "coupon_code": "HEMAT10", "profile_id": "p-1" }),
            status: OrderStatus::Paid,
            payment_provider: Some("midtrans".to_string()),
            provider_transaction_id: Some("trx-1".to_string()),
            payment_method: Some("bank_transfer".to_string()),
            paid_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_summary() {
        let payload = FulfillmentPayload::new(paid_order(), Vec::new());
        assert_eq!(payload.transaction_summary.reference_id, "TB-TEST-1");
        assert_eq!(payload.transaction_summary.status, "PAID");
        assert_eq!(payload.transaction_summary.coupon_code.as_deref(), Some("HEMAT10"));

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("order").is_some());
        assert!(json.get("associated_records").is_some());
        assert!(json.get("transaction_summary").is_some());
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_skipped() {
        let dispatcher =
            HttpFulfillmentDispatcher::new(None, 5, Arc::new(MemoryStore::new())).unwrap();
        assert!(dispatcher.deliver(&paid_order()).await.is_ok());
    }
}
