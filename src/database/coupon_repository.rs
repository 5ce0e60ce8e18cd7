use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::models::{Coupon, CouponDiscount};
use crate::database::repository::CouponStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
struct CouponRow {
    code: String,
    discount_type: String,
    discount_value: i64,
    is_active: bool,
    current_uses: i32,
    max_uses: i32,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DatabaseError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount = CouponDiscount::from_parts(&row.discount_type, row.discount_value)
            .ok_or_else(|| {
                DatabaseError::invalid_row(
                    "coupon",
                    format!("unknown discount type '{}'", row.discount_type),
                )
            })?;

        Ok(Coupon {
            code: row.code,
            discount,
            is_active: row.is_active,
            current_uses: row.current_uses,
            max_uses: row.max_uses,
            expires_at: row.expires_at,
        })
    }
}

/// Postgres-backed coupon store
#[derive(Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponStore for CouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DatabaseError> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT code, discount_type, discount_value, is_active, current_uses, max_uses, expires_at
             FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(Coupon::try_from).transpose()
    }

    async fn increment_usage(&self, code: &str) -> Result<Coupon, DatabaseError> {
        let row = sqlx::query_as::<_, CouponRow>(
            "UPDATE coupons SET current_uses = current_uses + 1, updated_at = NOW()
             WHERE code = $1
             RETURNING code, discount_type, discount_value, is_active, current_uses, max_uses, expires_at",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::NotFound {
                entity: "Coupon".to_string(),
                id: code.to_string(),
            })
        })?;

        Coupon::try_from(row)
    }
}
