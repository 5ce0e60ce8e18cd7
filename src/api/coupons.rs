use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::error::AppResult;
use crate::settlement::{CouponPreview, RedemptionRequest, RedemptionResult};

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub code: String,
    pub amount: i64,
}

/// `POST /coupons/preview`
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> AppResult<Json<CouponPreview>> {
    let preview = state.coupons.preview(&request.code, request.amount).await?;
    Ok(Json(preview))
}

/// `POST /coupons/redeem`
pub async fn redeem(
    State(state): State<AppState>,
    Json(request): Json<RedemptionRequest>,
) -> AppResult<Json<RedemptionResult>> {
    let result = state.redemptions.redeem(request).await?;
    Ok(Json(result))
}
