//! In-process store implementing every persistence trait.
//!
//! Backs the test suite and local development without Postgres. All maps sit
//! behind a single async mutex, so `transition_from_pending` is atomic the
//! same way the conditional `UPDATE` is.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::models::{
    Coupon, NewOrder, Order, OrderStatus, ProfileRecord, Settlement, WebhookEvent,
};
use crate::database::repository::{CouponStore, OrderStore, ProfileStore, WebhookLog};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    orders: HashMap<String, Order>,
    coupons: HashMap<String, Coupon>,
    profiles: HashMap<String, ProfileRecord>,
    webhook_events: Vec<WebhookEvent>,
    order_writes: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_coupon(&self, coupon: Coupon) {
        let mut state = self.state.lock().await;
        state.coupons.insert(coupon.code.clone(), coupon);
    }

    pub async fn put_profile(&self, profile: ProfileRecord) {
        let mut state = self.state.lock().await;
        state.profiles.insert(profile.id.clone(), profile);
    }

    /// Inserts plus successful transitions applied to orders so far
    pub async fn order_writes(&self) -> usize {
        self.state.lock().await.order_writes
    }

    pub async fn webhook_events(&self) -> Vec<WebhookEvent> {
        self.state.lock().await.webhook_events.clone()
    }
}

fn not_found(entity: &str, id: &str) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    })
}

fn merge_metadata(metadata: &mut serde_json::Value, key: &str, value: serde_json::Value) {
    if !metadata.is_object() {
        *metadata = serde_json::json!({});
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Order>, DatabaseError> {
        Ok(self.state.lock().await.orders.get(reference_id).cloned())
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.reference_id) {
            return Err(DatabaseError::unique_violation("orders_reference_id_key")
                .with_context(format!("inserting order {}", order.reference_id)));
        }

        let now = Utc::now();
        let stored = Order {
            id: Uuid::new_v4(),
            reference_id: order.reference_id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            customer_phone: order.customer_phone,
            amount: order.amount,
            product_name: order.product_name,
            metadata: order.metadata,
            status: order.status,
            payment_provider: order.payment_provider,
            provider_transaction_id: None,
            payment_method: order.payment_method,
            paid_at: order.paid_at,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(stored.reference_id.clone(), stored.clone());
        state.order_writes += 1;
        Ok(stored)
    }

    async fn transition_from_pending(
        &self,
        reference_id: &str,
        settlement: &Settlement,
    ) -> Result<Option<Order>, DatabaseError> {
        let mut state = self.state.lock().await;
        let updated = match state.orders.get_mut(reference_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = settlement.status;
                order.payment_provider = Some(settlement.payment_provider.clone());
                order.provider_transaction_id = settlement.provider_transaction_id.clone();
                if settlement.payment_method.is_some() {
                    order.payment_method = settlement.payment_method.clone();
                }
                order.paid_at = settlement.paid_at;
                merge_metadata(&mut order.metadata, "settlement", settlement.details.clone());
                order.updated_at = Utc::now();
                Some(order.clone())
            }
            _ => None,
        };
        if updated.is_some() {
            state.order_writes += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DatabaseError> {
        Ok(self.state.lock().await.coupons.get(code).cloned())
    }

    async fn increment_usage(&self, code: &str) -> Result<Coupon, DatabaseError> {
        let mut state = self.state.lock().await;
        let coupon = state
            .coupons
            .get_mut(code)
            .ok_or_else(|| not_found("Coupon", code))?;
        coupon.current_uses += 1;
        Ok(coupon.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileRecord>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.profiles.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl WebhookLog for MemoryStore {
    async fn log_event(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        let event = WebhookEvent {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            source: source.to_string(),
            payload,
            processed: false,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.state.lock().await.webhook_events.push(event.clone());
        Ok(event)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<WebhookEvent, DatabaseError> {
        let mut state = self.state.lock().await;
        let event = state
            .webhook_events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("WebhookEvent", event_id))?;
        event.processed = true;
        event.attempts += 1;
        event.processed_at = Some(Utc::now());
        Ok(event.clone())
    }

    async fn record_failure(&self, event_id: &str, error: &str) -> Result<WebhookEvent, DatabaseError> {
        let mut state = self.state.lock().await;
        let event = state
            .webhook_events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("WebhookEvent", event_id))?;
        event.attempts += 1;
        event.last_error = Some(error.to_string());
        Ok(event.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending_order(reference_id: &str) -> NewOrder {
        NewOrder {
            reference_id: reference_id.to_string(),
            customer_name: "Ayu".to_string(),
            customer_email: "ayu@example.com".to_string(),
            customer_phone: Some("081234567890".to_string()),
            amount: 249_000,
            product_name: "Full Reading".to_string(),
            metadata: json!({}),
            status: OrderStatus::Pending,
            payment_provider: Some("midtrans".to_string()),
            payment_method: None,
            paid_at: None,
        }
    }

    fn paid() -> Settlement {
        Settlement {
            status: OrderStatus::Paid,
            payment_provider: "midtrans".to_string(),
            provider_transaction_id: Some("trx-1".to_string()),
            payment_method: Some("qris".to_string()),
            paid_at: Some(Utc::now()),
            details: json!({ "gross_amount": 249000 }),
        }
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected() {
        let store = MemoryStore::new();
        store.insert(pending_order("TB-1")).await.unwrap();
        let err = store.insert(pending_order("TB-1")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_transition_only_applies_once() {
        let store = MemoryStore::new();
        store.insert(pending_order("TB-1")).await.unwrap();

        let first = store.transition_from_pending("TB-1", &paid()).await.unwrap();
        let second = store.transition_from_pending("TB-1", &paid()).await.unwrap();

        let order = first.expect("first writer wins");
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.metadata["settlement"]["gross_amount"], 249000);
        assert!(second.is_none());
        assert_eq!(store.order_writes().await, 2);
    }

    #[tokio::test]
    async fn test_transition_of_missing_order_is_none() {
        let store = MemoryStore::new();
        assert!(store.transition_from_pending("nope", &paid()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_webhook_log_lifecycle() {
        let store = MemoryStore::new();
        let event = store.log_event("payment_notification", "tripay", json!({"a": 1})).await.unwrap();
        store.record_failure(&event.id, "signature mismatch").await.unwrap();
        let processed = store.mark_processed(&event.id).await.unwrap();
        assert!(processed.processed);
        assert_eq!(processed.attempts, 2);
        assert_eq!(processed.last_error.as_deref(), Some("signature mismatch"));
    }
}
