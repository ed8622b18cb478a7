//! Server cart replicas.
//!
//! Each user has at most one row; the cart is stored as a `JSONB` object of
//! product ID to quantity. Reads go through `CartSnapshot::sanitize`, so a
//! row written by anything else cannot put a bad quantity into a cart.

use greencart_core::cart::CartSnapshot;
use greencart_core::store::CartStore;
use greencart_core::{StorageError, UserId};
use sqlx::PgPool;
use sqlx::types::Json;

use super::RepositoryError;

/// `PostgreSQL`-backed cart store.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write(&self, user_id: UserId, cart: &CartSnapshot) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO greencart.cart (user_id, items)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                items = EXCLUDED.items,
                updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(Json(cart))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl CartStore for PgCartStore {
    async fn load(&self, user_id: UserId) -> Result<CartSnapshot, StorageError> {
        let items: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT items FROM greencart.cart WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(items
            .map(|raw| CartSnapshot::sanitize(&raw))
            .unwrap_or_default())
    }

    async fn save(&self, user_id: UserId, cart: &CartSnapshot) -> Result<(), StorageError> {
        Ok(self.write(user_id, cart).await?)
    }

    async fn clear(&self, user_id: UserId) -> Result<(), StorageError> {
        Ok(self.write(user_id, &CartSnapshot::new()).await?)
    }
}
