use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::error::AppResult;
use crate::settlement::{CheckoutIntent, CheckoutResult};

/// `POST /checkout/:provider`
pub async fn create_checkout(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(intent): Json<CheckoutIntent>,
) -> AppResult<Json<CheckoutResult>> {
    let result = state.checkout.create_checkout(&provider, intent).await?;
    Ok(Json(result))
}
