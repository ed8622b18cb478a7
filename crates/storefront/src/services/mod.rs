//! External service clients for the storefront.
//!
//! - `stripe` - Stripe Checkout sessions (`PaymentGateway` implementation)
//! - `catalog_cache` - moka-backed cache in front of the product catalog

pub mod catalog_cache;
pub mod stripe;

pub use catalog_cache::CachedCatalog;
pub use stripe::StripeClient;
