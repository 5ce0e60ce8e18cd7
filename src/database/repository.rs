use crate::database::error::DatabaseError;
use crate::database::models::{
    Coupon, NewOrder, Order, ProfileRecord, Settlement, WebhookEvent,
};
use async_trait::async_trait;

/// Order persistence.
///
/// Orders are only ever inserted and moved out of `Pending`; nothing in this
/// service deletes or rewrites them.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up an order by its caller-minted reference id
    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Order>, DatabaseError>;

    /// Insert a new order. A reused reference id fails with a unique violation.
    async fn insert(&self, order: NewOrder) -> Result<Order, DatabaseError>;

    /// Apply `settlement` only if the order is still `Pending`.
    ///
    /// Must be a single atomic conditional write. Returns `None` when no row
    /// matched, i.e. the order is missing or another writer already moved it.
    async fn transition_from_pending(
        &self,
        reference_id: &str,
        settlement: &Settlement,
    ) -> Result<Option<Order>, DatabaseError>;
}

/// Coupon persistence
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DatabaseError>;

    /// Add one use. Not guarded by the cap; callers check eligibility first.
    async fn increment_usage(&self, code: &str) -> Result<Coupon, DatabaseError>;
}

/// Read access to profile data referenced from order metadata
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileRecord>, DatabaseError>;
}

/// Audit trail of inbound provider notifications
#[async_trait]
pub trait WebhookLog: Send + Sync {
    async fn log_event(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError>;

    async fn mark_processed(&self, event_id: &str) -> Result<WebhookEvent, DatabaseError>;

    async fn record_failure(&self, event_id: &str, error: &str) -> Result<WebhookEvent, DatabaseError>;
}
