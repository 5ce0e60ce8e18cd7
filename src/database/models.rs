//! Persisted entities shared by the Postgres and in-memory stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle. `Paid` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub reference_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Whole Rupiah
    pub amount: i64,
    pub product_name: String,
    pub metadata: serde_json::Value,
    pub status: OrderStatus,
    pub payment_provider: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Profile record ids referenced by `metadata.profile_id` / `metadata.profile_ids`
    pub fn profile_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(id) = self.metadata.get("profile_id").and_then(|v| v.as_str()) {
            ids.push(id.to_string());
        }
        if let Some(list) = self.metadata.get("profile_ids").and_then(|v| v.as_array()) {
            ids.extend(
                list.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string()),
            );
        }
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.metadata.get("coupon_code").and_then(|v| v.as_str())
    }
}

/// Values for a row about to be inserted
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub amount: i64,
    pub product_name: String,
    pub metadata: serde_json::Value,
    pub status: OrderStatus,
    pub payment_provider: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// The write applied when an order leaves `Pending`
#[derive(Debug, Clone)]
pub struct Settlement {
    pub status: OrderStatus,
    pub payment_provider: String,
    pub provider_transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Merged into the order's metadata under the `settlement` key
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponDiscount {
    /// Whole Rupiah taken off the price
    Fixed(i64),
    /// 1..=100
    Percentage(u8),
    Free,
}

impl CouponDiscount {
    pub fn from_parts(discount_type: &str, value: i64) -> Option<Self> {
        match discount_type {
            "fixed" => Some(CouponDiscount::Fixed(value.max(0))),
            "percentage" => u8::try_from(value.clamp(0, 100))
                .ok()
                .map(CouponDiscount::Percentage),
            "free" => Some(CouponDiscount::Free),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CouponDiscount::Fixed(_) => "fixed",
            CouponDiscount::Percentage(_) => "percentage",
            CouponDiscount::Free => "free",
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            CouponDiscount::Fixed(amount) => *amount,
            CouponDiscount::Percentage(pct) => i64::from(*pct),
            CouponDiscount::Free => 0,
        }
    }

    /// Price after the discount, never below zero
    pub fn apply(&self, amount: i64) -> i64 {
        match self {
            CouponDiscount::Fixed(off) => amount.saturating_sub(*off).max(0),
            CouponDiscount::Percentage(pct) => {
                let off = i128::from(amount) * i128::from((*pct).min(100)) / 100;
                (i128::from(amount) - off).clamp(0, i128::from(i64::MAX)) as i64
            }
            CouponDiscount::Free => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, CouponDiscount::Free | CouponDiscount::Percentage(100))
    }
}

/// Coupon entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount: CouponDiscount,
    pub is_active: bool,
    pub current_uses: i32,
    pub max_uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_uses >= self.max_uses
    }
}

/// Profile data (birth data, chart identifiers) attached to a fulfillment payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub kind: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Raw inbound notification kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
