//! Provider notification endpoints
//!
//! Anything that should stop provider retries answers 200, including unknown
//! orders and duplicate deliveries. Signature failures answer 403.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::api::AppState;
use crate::error::AppResult;
use crate::payments::types::WebhookRequest;
use crate::settlement::WebhookAck;

/// `POST /webhooks/:provider`
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let ack = state
        .webhooks
        .process(Some(&provider), WebhookRequest::new(headers, body))
        .await?;
    Ok(Json(ack))
}

/// `POST /webhooks`, provider detected from the request
pub async fn receive_detected(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let ack = state
        .webhooks
        .process(None, WebhookRequest::new(headers, body))
        .await?;
    Ok(Json(ack))
}
