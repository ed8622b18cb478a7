//! Orders and order items.
//!
//! An order and its items are written in one transaction. Items keep their
//! submission order through the `position` column.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use greencart_core::order::{NewOrder, Order, OrderItem};
use greencart_core::store::OrderStore;
use greencart_core::{AddressId, OrderId, PaymentType, ProductId, StorageError, UserId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use super::{RepositoryError, map_constraint_error};

const ORDER_COLUMNS: &str = "id, user_id, amount, address_id, status, payment_type, is_paid, \
                             created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    amount: Decimal,
    address_id: AddressId,
    status: String,
    payment_type: PaymentType,
    is_paid: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            amount: self.amount,
            address_id: self.address_id,
            status: self.status,
            payment_type: self.payment_type,
            is_paid: self.is_paid,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: String,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let product_id = ProductId::parse(&row.product_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product id in order item: {e}"))
        })?;
        let quantity = u32::try_from(row.quantity)
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "invalid quantity {} in order {}",
                    row.quantity, row.order_id
                ))
            })?;

        Ok(Self {
            product_id,
            quantity,
        })
    }
}

/// `PostgreSQL`-backed order store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut product_ids = Vec::with_capacity(order.items.len());
        let mut quantities = Vec::with_capacity(order.items.len());
        for item in &order.items {
            product_ids.push(item.product_id.as_str().to_owned());
            quantities.push(i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::Conflict(format!("quantity {} is too large", item.quantity))
            })?);
        }

        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO greencart."order" (user_id, amount, address_id, status, payment_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.user_id)
        .bind(order.amount)
        .bind(order.address_id)
        .bind(&order.status)
        .bind(order.payment_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint_error(e, "order rejected"))?;

        sqlx::query(
            r"
            INSERT INTO greencart.order_item (order_id, position, product_id, quantity)
            SELECT $1, item.ordinality::int4, item.product_id, item.quantity
            FROM UNNEST($2::text[], $3::int4[])
                WITH ORDINALITY AS item(product_id, quantity, ordinality)
            ",
        )
        .bind(row.id)
        .bind(&product_ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into_order(order.items))
    }

    /// Attach items to order rows, preserving row order.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, quantity
            FROM greencart.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items
                .entry(order_id)
                .or_default()
                .push(OrderItem::try_from(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }

    async fn fetch_visible(&self, user_id: Option<UserId>) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM greencart."order"
            WHERE (payment_type = 'COD' OR is_paid)
              AND ($1::int4 IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }
}

impl OrderStore for PgOrderStore {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn insert(&self, order: NewOrder) -> Result<Order, StorageError> {
        Ok(self.create(order).await?)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM greencart."order" WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_items(vec![row]).await?.into_iter().next())
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn mark_paid(&self, id: OrderId) -> Result<bool, StorageError> {
        // Plain set: a redelivered event rewrites TRUE over TRUE, which the
        // updated_at trigger ignores.
        let result = sqlx::query(r#"UPDATE greencart."order" SET is_paid = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_visible_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StorageError> {
        Ok(self.fetch_visible(Some(user_id)).await?)
    }

    async fn list_visible(&self) -> Result<Vec<Order>, StorageError> {
        Ok(self.fetch_visible(None).await?)
    }
}
