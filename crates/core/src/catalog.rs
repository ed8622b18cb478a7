//! Product catalog lookup and pricing policies.
//!
//! The catalog is owned elsewhere; the core only reads current prices from it.
//! How a missing product is treated depends on why we are pricing:
//!
//! - [`PricingPolicy::Lenient`] for display totals: a product deleted from the
//!   catalog simply stops contributing, so a stale cart never fails to render.
//! - [`PricingPolicy::Strict`] for order creation: a missing product aborts the
//!   whole transaction and is reported by ID.

use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::CatalogError;
use crate::order::OrderItem;
use crate::types::ProductId;

/// A catalog product as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Current unit offer price; never negative.
    pub offer_price: Decimal,
    pub in_stock: bool,
}

/// Read-only product lookup.
pub trait Catalog: Send + Sync {
    /// Resolve a product by ID. `Ok(None)` means it does not exist.
    fn get_product(
        &self,
        id: &ProductId,
    ) -> impl Future<Output = Result<Option<Product>, CatalogError>> + Send;
}

/// How to treat products missing from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingPolicy {
    /// Skip missing products (display-time aggregation).
    Lenient,
    /// Fail on the first missing product (transactional creation).
    Strict,
}

/// Pricing failure.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Under `Strict`, a product could not be resolved.
    #[error("product with id {0} not found")]
    ProductNotFound(ProductId),

    /// The catalog could not be queried.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// An item resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product: Product,
    pub quantity: u32,
}

impl PricedLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.offer_price * Decimal::from(self.quantity)
    }
}

/// Resolve `items` against the catalog, in order, under `policy`.
///
/// Lookups run one at a time; a slow catalog delays the caller.
///
/// # Errors
///
/// Returns `PricingError::ProductNotFound` for the first unknown product under
/// `Strict`, or `PricingError::Catalog` if a lookup fails under either policy.
pub async fn price_items<C: Catalog>(
    catalog: &C,
    items: &[OrderItem],
    policy: PricingPolicy,
) -> Result<Vec<PricedLine>, PricingError> {
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        match catalog.get_product(&item.product_id).await? {
            Some(product) => lines.push(PricedLine {
                product,
                quantity: item.quantity,
            }),
            None => match policy {
                PricingPolicy::Lenient => {
                    debug!(product_id = %item.product_id, "Skipping unknown product");
                }
                PricingPolicy::Strict => {
                    return Err(PricingError::ProductNotFound(item.product_id.clone()));
                }
            },
        }
    }

    Ok(lines)
}

/// Sum of line totals before any surcharge.
#[must_use]
pub fn base_amount(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(PricedLine::line_total).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::memory::InMemoryCatalog;

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn item(id: &str, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: pid(id),
            quantity,
        }
    }

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.insert(Product {
            id: pid("p1"),
            name: "Apples".to_string(),
            category: "Fruits".to_string(),
            offer_price: dec!(100),
            in_stock: true,
        });
        catalog.insert(Product {
            id: pid("p3"),
            name: "Milk".to_string(),
            category: "Dairy".to_string(),
            offer_price: dec!(2.50),
            in_stock: false,
        });
        catalog
    }

    #[tokio::test]
    async fn test_lenient_skips_missing_products() {
        let items = [item("p1", 2), item("p2", 1), item("p3", 4)];
        let lines = price_items(&catalog(), &items, PricingPolicy::Lenient)
            .await
            .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(base_amount(&lines), dec!(210));
    }

    #[tokio::test]
    async fn test_strict_reports_missing_product() {
        let items = [item("p1", 2), item("p2", 1)];
        let err = price_items(&catalog(), &items, PricingPolicy::Strict)
            .await
            .unwrap_err();

        assert!(matches!(err, PricingError::ProductNotFound(id) if id.as_str() == "p2"));
    }

    #[tokio::test]
    async fn test_strict_keeps_item_order() {
        let items = [item("p3", 1), item("p1", 1)];
        let lines = price_items(&catalog(), &items, PricingPolicy::Strict)
            .await
            .unwrap();

        let ids: Vec<&str> = lines.iter().map(|l| l.product.id.as_str()).collect();
        assert_eq!(ids, ["p3", "p1"]);
    }

    #[tokio::test]
    async fn test_catalog_failure_propagates_under_lenient() {
        let catalog = catalog();
        catalog.fail_lookups(true);

        let err = price_items(&catalog, &[item("p1", 1)], PricingPolicy::Lenient)
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::Catalog(_)));
    }
}
