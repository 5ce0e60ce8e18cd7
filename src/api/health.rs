use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::database;
use crate::payments::types::ProviderName;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub providers: Vec<ProviderName>,
    pub database: String,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let (code, status, database) = match &state.pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => (StatusCode::OK, "healthy", "connected"),
            Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unreachable"),
        },
        None => (StatusCode::OK, "healthy", "in-memory"),
    };

    let response = HealthResponse {
        status: status.to_string(),
        version,
        environment: state.environment.clone(),
        providers: state.providers.configured(),
        database: database.to_string(),
    };

    (code, Json(response))
}
