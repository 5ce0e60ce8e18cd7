use crate::database::error::DatabaseError;
use crate::database::models::WebhookEvent;
use crate::database::repository::WebhookLog;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct WebhookEventRow {
    id: String,
    event_type: String,
    source: String,
    payload: serde_json::Value,
    processed: bool,
    attempts: i32,
    last_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<WebhookEventRow> for WebhookEvent {
    fn from(row: WebhookEventRow) -> Self {
        WebhookEvent {
            id: row.id,
            event_type: row.event_type,
            source: row.source,
            payload: row.payload,
            processed: row.processed,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

/// Webhook Repository for provider notification storage and tracking
#[derive(Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookLog for WebhookRepository {
    async fn log_event(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        let event_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, WebhookEventRow>(
            "INSERT INTO webhook_events (id, event_type, source, payload, processed, attempts, created_at)
             VALUES ($1, $2, $3, $4, false, 0, NOW())
             RETURNING id, event_type, source, payload, processed, attempts, last_error, created_at, processed_at",
        )
        .bind(&event_id)
        .bind(event_type)
        .bind(source)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map(WebhookEvent::from)
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_processed(&self, event_id: &str) -> Result<WebhookEvent, DatabaseError> {
        sqlx::query_as::<_, WebhookEventRow>(
            "UPDATE webhook_events SET processed = true, attempts = attempts + 1, processed_at = NOW()
             WHERE id = $1
             RETURNING id, event_type, source, payload, processed, attempts, last_error, created_at, processed_at",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map(WebhookEvent::from)
        .map_err(DatabaseError::from_sqlx)
    }

    async fn record_failure(&self, event_id: &str, error: &str) -> Result<WebhookEvent, DatabaseError> {
        sqlx::query_as::<_, WebhookEventRow>(
            "UPDATE webhook_events
             SET attempts = attempts + 1, last_error = $2
             WHERE id = $1
             RETURNING id, event_type, source, payload, processed, attempts, last_error, created_at, processed_at",
        )
        .bind(event_id)
        .bind(error)
        .fetch_one(&self.pool)
        .await
        .map(WebhookEvent::from)
        .map_err(DatabaseError::from_sqlx)
    }
}
