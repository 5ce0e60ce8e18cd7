use crate::database::error::DatabaseError;
use crate::database::models::{NewOrder, Order, OrderStatus, Settlement};
use crate::database::repository::OrderStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, reference_id, customer_name, customer_email, customer_phone, \
     amount, product_name, metadata, status, payment_provider, provider_transaction_id, \
     payment_method, paid_at, created_at, updated_at";

/// Row shape of the `orders` table
#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: Uuid,
    reference_id: String,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    amount: i64,
    product_name: String,
    metadata: serde_json::Value,
    status: String,
    payment_provider: Option<String>,
    provider_transaction_id: Option<String>,
    payment_method: Option<String>,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DatabaseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row
            .status
            .parse()
            .map_err(|e: String| DatabaseError::invalid_row("order", e))?;

        Ok(Order {
            id: row.id,
            reference_id: row.reference_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            amount: row.amount,
            product_name: row.product_name,
            metadata: row.metadata,
            status,
            payment_provider: row.payment_provider,
            provider_transaction_id: row.provider_transaction_id,
            payment_method: row.payment_method,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed order store
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Order>, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE reference_id = $1"
        ))
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(Order::try_from).transpose()
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders
             (id, reference_id, customer_name, customer_email, customer_phone, amount, product_name,
              metadata, status, payment_provider, payment_method, paid_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&order.reference_id)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(order.amount)
        .bind(&order.product_name)
        .bind(&order.metadata)
        .bind(order.status.as_str())
        .bind(&order.payment_provider)
        .bind(&order.payment_method)
        .bind(order.paid_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::from_sqlx(e).with_context(format!("inserting order {}", order.reference_id))
        })?;

        Order::try_from(row)
    }

    async fn transition_from_pending(
        &self,
        reference_id: &str,
        settlement: &Settlement,
    ) -> Result<Option<Order>, DatabaseError> {
        let settlement_metadata = serde_json::json!({ "settlement": settlement.details });

        // The status predicate makes this the compare-and-set: concurrent
        // writers serialize on the row lock and only one sees PENDING.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders
             SET status = $2,
                 payment_provider = $3,
                 provider_transaction_id = $4,
                 payment_method = COALESCE($5, payment_method),
                 paid_at = $6,
                 metadata = COALESCE(metadata, '{{}}'::jsonb) || $7::jsonb,
                 updated_at = NOW()
             WHERE reference_id = $1 AND status = 'PENDING'
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(reference_id)
        .bind(settlement.status.as_str())
        .bind(&settlement.payment_provider)
        .bind(&settlement.provider_transaction_id)
        .bind(&settlement.payment_method)
        .bind(settlement.paid_at)
        .bind(settlement_metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(Order::try_from).transpose()
    }
}
