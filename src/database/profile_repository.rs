use crate::database::error::DatabaseError;
use crate::database::models::ProfileRecord;
use crate::database::repository::ProfileStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    id: String,
    kind: String,
    data: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProfileRow> for ProfileRecord {
    fn from(row: ProfileRow) -> Self {
        ProfileRecord {
            id: row.id,
            kind: row.kind,
            data: row.data,
            created_at: row.created_at,
        }
    }
}

/// Read-only access to birth-data and chart profiles
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ProfileRecord>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, kind, data, created_at FROM profiles WHERE id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows.into_iter().map(ProfileRecord::from).collect())
    }
}
