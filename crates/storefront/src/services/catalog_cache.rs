//! Cached catalog for display-time pricing.
//!
//! Only the lenient cart total goes through this cache. Order creation always
//! reads the catalog directly so an order is priced at the current price.

use std::sync::Arc;
use std::time::Duration;

use greencart_core::catalog::{Catalog, Product};
use greencart_core::{CatalogError, ProductId};
use moka::future::Cache;
use tracing::debug;

/// Catalog wrapper caching found products for a fixed TTL.
#[derive(Clone)]
pub struct CachedCatalog<C> {
    inner: Arc<C>,
    cache: Cache<ProductId, Product>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap `inner`, keeping products for `ttl`.
    #[must_use]
    pub fn new(inner: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(inner),
            cache,
        }
    }

    /// Drop every cached product.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        if let Some(product) = self.cache.get(id).await {
            debug!(product_id = %id, "Cache hit for product");
            return Ok(Some(product));
        }

        // Misses are not cached so a newly imported product shows up at once.
        let product = self.inner.get_product(id).await?;
        if let Some(product) = &product {
            self.cache.insert(id.clone(), product.clone()).await;
        }
        Ok(product)
    }
}
