//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `greencart`
//!
//! ## Tables
//!
//! - `product` - Catalog products (imported with `gc-cli catalog import`)
//! - `address` - User shipping addresses
//! - `cart` - Server cart replica per user (`JSONB` object)
//! - `order` / `order_item` - Orders and their ordered line items
//! - `tower_sessions.session` - Guest sessions (tower-sessions storage)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p greencart-cli -- migrate
//! ```
//!
//! Every store here is a `Clone` handle around the pool and implements one of
//! the `greencart_core::store` traits.

mod addresses;
mod carts;
mod catalog;
mod orders;

use std::time::Duration;

use greencart_core::StorageError;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::PgAddressStore;
pub use carts::PgCartStore;
pub use catalog::{CatalogEntry, PgCatalog};
pub use orders::PgOrderStore;

/// Repository error type.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unknown address).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for StorageError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DataCorruption(msg) => Self::DataCorruption(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Map a unique/foreign-key violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_constraint_error(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(format!("{what}: {}", db_err.message()));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
