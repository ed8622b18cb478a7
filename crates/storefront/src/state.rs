//! Application state shared across handlers.

use std::sync::Arc;

use greencart_core::GatewayError;
use greencart_core::order::OrderBuilder;
use greencart_core::webhook::WebhookReconciler;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{PgAddressStore, PgCartStore, PgCatalog, PgOrderStore};
use crate::middleware::IdentityResolver;
use crate::services::{CachedCatalog, StripeClient};

/// Order builder wired to the `PostgreSQL` stores and Stripe.
pub type StorefrontOrderBuilder = OrderBuilder<PgCatalog, PgOrderStore, PgCartStore, StripeClient>;

/// Webhook reconciler wired to the `PostgreSQL` stores.
pub type StorefrontReconciler = WebhookReconciler<PgOrderStore, PgCartStore>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    identity: IdentityResolver,
    display_catalog: CachedCatalog<PgCatalog>,
    orders: StorefrontOrderBuilder,
    reconciler: StorefrontReconciler,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, GatewayError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let identity = IdentityResolver::new(&config.jwt_secret);
        let catalog = PgCatalog::new(pool.clone());
        let display_catalog = CachedCatalog::new(catalog.clone(), config.catalog_cache_ttl);

        let orders = OrderBuilder::new(
            catalog,
            PgOrderStore::new(pool.clone()),
            PgCartStore::new(pool.clone()),
            stripe,
        );
        let reconciler = WebhookReconciler::new(
            PgOrderStore::new(pool.clone()),
            PgCartStore::new(pool.clone()),
            config.stripe.webhook_secret.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                display_catalog,
                orders,
                reconciler,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Identity token resolver.
    #[must_use]
    pub fn identity(&self) -> &IdentityResolver {
        &self.inner.identity
    }

    /// Cached catalog for lenient display totals.
    #[must_use]
    pub fn display_catalog(&self) -> &CachedCatalog<PgCatalog> {
        &self.inner.display_catalog
    }

    /// Order builder (strict pricing, uncached catalog).
    #[must_use]
    pub fn orders(&self) -> &StorefrontOrderBuilder {
        &self.inner.orders
    }

    /// Payment webhook reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &StorefrontReconciler {
        &self.inner.reconciler
    }

    /// Server cart store.
    #[must_use]
    pub fn carts(&self) -> PgCartStore {
        PgCartStore::new(self.inner.pool.clone())
    }

    /// Order store for listings.
    #[must_use]
    pub fn order_store(&self) -> PgOrderStore {
        PgOrderStore::new(self.inner.pool.clone())
    }

    /// Address store.
    #[must_use]
    pub fn addresses(&self) -> PgAddressStore {
        PgAddressStore::new(self.inner.pool.clone())
    }
}
