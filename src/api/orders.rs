use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::AppState;
use crate::database::models::OrderStatus;
use crate::error::{AppError, AppResult, DomainError};

/// What the return page polls for. Customer details are left out.
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub reference_id: String,
    pub status: OrderStatus,
    pub amount: i64,
    pub product_name: String,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// `GET /orders/:reference_id`
pub async fn order_status(
    State(state): State<AppState>,
    Path(reference_id): Path<String>,
) -> AppResult<Json<OrderStatusResponse>> {
    let order = state
        .orders
        .find_by_reference(&reference_id)
        .await?
        .ok_or_else(|| AppError::from(DomainError::OrderNotFound { reference_id }))?;

    Ok(Json(OrderStatusResponse {
        reference_id: order.reference_id,
        status: order.status,
        amount: order.amount,
        product_name: order.product_name,
        payment_method: order.payment_method,
        paid_at: order.paid_at,
    }))
}
