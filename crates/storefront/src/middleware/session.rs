//! Session layer holding guest carts.
//!
//! Sessions only exist to keep an anonymous visitor's cart between requests.
//! Once the visitor presents an identity token the guest cart is merged into
//! the server cart and removed from the session.

use sqlx::PgPool;
use tower_sessions::cookie::{SameSite, time::Duration};
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "gc_session";

/// Guest carts are kept for 30 days of inactivity.
const SESSION_EXPIRY_DAYS: i64 = 30;

/// Create the session layer backed by `tower_sessions.session`.
///
/// The table is created by the storefront migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_EXPIRY_DAYS)))
        .with_secure(config.base_url.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
