//! Order reconciliation
//!
//! Applies an authenticated [`PaymentEvent`] to its order. Orders only move
//! `PENDING -> PAID` or `PENDING -> FAILED`; the move is a compare-and-set in
//! the store, and only the caller that wins it emits fulfillment. Providers
//! redeliver on any non-2xx, so every other path returns `Ok` and leaves the
//! order alone.

use crate::database::models::{OrderStatus, Settlement};
use crate::database::repository::{CouponStore, OrderStore};
use crate::error::AppResult;
use crate::payments::types::{PaymentEvent, PaymentOutcome, ReportedAmount};
use crate::settlement::fulfillment::FulfillmentDispatcher;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a single event did to its order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This call flipped the order to PAID and emitted fulfillment
    Settled,
    MarkedFailed,
    /// Provider reports the payment as still in progress
    StillPending,
    /// Duplicate or late delivery
    AlreadyFinal { status: OrderStatus },
    /// A concurrent delivery settled the order between our read and write
    LostRace,
    OrderNotFound,
    /// Signed amount differs from the order amount, or is not a whole Rupiah
    /// value (`received: None`); not applied
    AmountMismatch { expected: i64, received: Option<i64> },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Settled => "settled",
            ReconcileOutcome::MarkedFailed => "marked_failed",
            ReconcileOutcome::StillPending => "still_pending",
            ReconcileOutcome::AlreadyFinal { .. } => "already_final",
            ReconcileOutcome::LostRace => "lost_race",
            ReconcileOutcome::OrderNotFound => "order_not_found",
            ReconcileOutcome::AmountMismatch { .. } => "amount_mismatch",
        }
    }
}

#[derive(Clone)]
pub struct OrderReconciler {
    orders: Arc<dyn OrderStore>,
    coupons: Arc<dyn CouponStore>,
    fulfillment: Arc<dyn FulfillmentDispatcher>,
}

impl OrderReconciler {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        coupons: Arc<dyn CouponStore>,
        fulfillment: Arc<dyn FulfillmentDispatcher>,
    ) -> Self {
        Self {
            orders,
            coupons,
            fulfillment,
        }
    }

    /// Apply `event`. Errors only come from the store; every decision about
    /// the order itself is an `Ok` outcome.
    pub async fn reconcile(&self, event: &PaymentEvent) -> AppResult<ReconcileOutcome> {
        let reference_id = event.order_reference_id.as_str();

        let order = match self.orders.find_by_reference(reference_id).await? {
            Some(order) => order,
            None => {
                error!(
                    provider = %event.provider,
                    reference_id = %reference_id,
                    provider_transaction_id = ?event.provider_transaction_id,
                    outcome = ?event.outcome,
                    "Payment notification for unknown order, acknowledged without changes"
                );
                return Ok(ReconcileOutcome::OrderNotFound);
            }
        };

        if order.status.is_terminal() {
            info!(
                reference_id = %reference_id,
                status = %order.status,
                outcome = ?event.outcome,
                "Order already settled, ignoring notification"
            );
            return Ok(ReconcileOutcome::AlreadyFinal {
                status: order.status,
            });
        }

        let target = match event.outcome {
            PaymentOutcome::Success => OrderStatus::Paid,
            PaymentOutcome::Failed => OrderStatus::Failed,
            PaymentOutcome::Pending => {
                info!(reference_id = %reference_id, "Payment still pending");
                return Ok(ReconcileOutcome::StillPending);
            }
        };

        if target == OrderStatus::Paid {
            let mismatch = match &event.amount {
                Some(ReportedAmount::Whole(received)) if *received != order.amount => {
                    Some(Some(*received))
                }
                Some(ReportedAmount::Unreadable(_)) => Some(None),
                _ => None,
            };
            if let Some(received) = mismatch {
                error!(
                    provider = %event.provider,
                    reference_id = %reference_id,
                    expected = order.amount,
                    reported = %event.amount.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "Settled amount does not match order amount, not applying"
                );
                return Ok(ReconcileOutcome::AmountMismatch {
                    expected: order.amount,
                    received,
                });
            }
        }

        let received_at = Utc::now();
        let settlement = Settlement {
            status: target,
            payment_provider: event.provider.to_string(),
            provider_transaction_id: event.provider_transaction_id.clone(),
            payment_method: event.payment_method_label.clone(),
            paid_at: (target == OrderStatus::Paid)
                .then(|| event.settled_at.unwrap_or(received_at)),
            details: serde_json::json!({
                "provider": event.provider,
                "provider_transaction_id": event.provider_transaction_id,
                "outcome": event.outcome,
                "payment_method": event.payment_method_label,
                "reported_amount": event.amount,
                "received_at": received_at,
            }),
        };

        let updated = match self
            .orders
            .transition_from_pending(reference_id, &settlement)
            .await?
        {
            Some(updated) => updated,
            None => {
                info!(
                    reference_id = %reference_id,
                    "Order left PENDING concurrently, notification is a duplicate"
                );
                return Ok(ReconcileOutcome::LostRace);
            }
        };

        if updated.status == OrderStatus::Failed {
            info!(reference_id = %reference_id, provider = %event.provider, "Order marked FAILED");
            return Ok(ReconcileOutcome::MarkedFailed);
        }

        info!(
            reference_id = %reference_id,
            provider = %event.provider,
            payment_method = ?updated.payment_method,
            "Order settled as PAID"
        );

        if let Some(code) = updated.coupon_code() {
            if let Err(e) = self.coupons.increment_usage(code).await {
                warn!(
                    reference_id = %reference_id,
                    code = %code,
                    error = %e,
                    "Failed to count coupon use for settled order"
                );
            }
        }

        self.fulfillment.emit(&updated);
        Ok(ReconcileOutcome::Settled)
    }
}
