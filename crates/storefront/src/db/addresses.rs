//! Shipping addresses.

use chrono::{DateTime, Utc};
use greencart_core::address::{Address, NewAddress, PostalAddress};
use greencart_core::store::AddressStore;
use greencart_core::{AddressId, StorageError, UserId};
use sqlx::PgPool;

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    first_name: String,
    last_name: String,
    email: String,
    street: String,
    city: String,
    state: String,
    zipcode: String,
    country: String,
    phone: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            postal: PostalAddress {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                street: row.street,
                city: row.city,
                state: row.state,
                zipcode: row.zipcode,
                country: row.country,
                phone: row.phone,
            },
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL`-backed address store.
#[derive(Debug, Clone)]
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AddressStore for PgAddressStore {
    async fn insert(&self, address: NewAddress) -> Result<Address, StorageError> {
        let postal = &address.postal;
        let row: AddressRow = sqlx::query_as(
            r"
            INSERT INTO greencart.address
                (user_id, first_name, last_name, email, street, city, state, zipcode, country, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, user_id, first_name, last_name, email, street, city, state,
                      zipcode, country, phone, created_at
            ",
        )
        .bind(address.user_id)
        .bind(&postal.first_name)
        .bind(&postal.last_name)
        .bind(&postal.email)
        .bind(&postal.street)
        .bind(&postal.city)
        .bind(&postal.state)
        .bind(&postal.zipcode)
        .bind(&postal.country)
        .bind(&postal.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, StorageError> {
        let rows: Vec<AddressRow> = sqlx::query_as(
            r"
            SELECT id, user_id, first_name, last_name, email, street, city, state,
                   zipcode, country, phone, created_at
            FROM greencart.address
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(Address::from).collect())
    }
}
