//! Catalog products.

use greencart_core::catalog::{Catalog, Product};
use greencart_core::{CatalogError, ProductId};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use super::RepositoryError;

/// Product row as read by the storefront.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    category: String,
    offer_price: Decimal,
    in_stock: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let id = ProductId::parse(&row.id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product id in database: {e}"))
        })?;

        Ok(Self {
            id,
            name: row.name,
            category: row.category,
            offer_price: row.offer_price,
            in_stock: row.in_stock,
        })
    }
}

/// A full catalog record, as imported from a YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    pub category: String,
    /// List price before any offer.
    pub price: Decimal,
    pub offer_price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

/// `PostgreSQL`-backed product catalog.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored ID is blank.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, category, offer_price, in_stock
            FROM greencart.product
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Insert a product or overwrite an existing one with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the entry violates a constraint
    /// (e.g. a negative price), `RepositoryError::Database` otherwise.
    pub async fn upsert(&self, entry: &CatalogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO greencart.product
                (id, name, description, category, price, offer_price, images, in_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                offer_price = EXCLUDED.offer_price,
                images = EXCLUDED.images,
                in_stock = EXCLUDED.in_stock
            ",
        )
        .bind(entry.id.as_str())
        .bind(&entry.name)
        .bind(sqlx::types::Json(&entry.description))
        .bind(&entry.category)
        .bind(entry.price)
        .bind(entry.offer_price)
        .bind(sqlx::types::Json(&entry.images))
        .bind(entry.in_stock)
        .execute(&self.pool)
        .await
        .map_err(|e| super::map_constraint_error(e, "invalid catalog entry"))?;

        Ok(())
    }
}

impl Catalog for PgCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        self.get(id)
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_catalog_entry_from_yaml_defaults() {
        let yaml = r"
id: p1
name: Organic Apples
category: Fruits
price: '4.50'
offerPrice: '3.99'
";
        let entry: CatalogEntry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entry.id.as_str(), "p1");
        assert_eq!(entry.offer_price, dec!(3.99));
        assert!(entry.in_stock);
        assert!(entry.images.is_empty());
    }

    #[test]
    fn test_blank_product_id_row_is_corruption() {
        let row = ProductRow {
            id: "  ".to_string(),
            name: "Ghost".to_string(),
            category: "None".to_string(),
            offer_price: dec!(1),
            in_stock: true,
        };
        assert!(matches!(
            Product::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
