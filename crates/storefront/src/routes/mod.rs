//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Cart (guest or authenticated)
//! GET  /api/cart               - Current cart with count and display total
//! POST /api/cart/add           - {itemId}
//! POST /api/cart/set           - {itemId, quantity}; quantity <= 0 removes
//! POST /api/cart/remove        - {itemId}
//! POST /api/cart/update        - {cartItems}; replace server cart (auth)
//! POST /api/cart/merge         - {cartItems}; login merge, server wins (auth)
//!
//! # Addresses (auth)
//! POST /api/address/add        - {address}
//! GET  /api/address/get        - Newest first
//!
//! # Orders
//! POST /api/order/cod          - {items, addressId} (auth)
//! POST /api/order/stripe       - {items, addressId}; returns checkout URL (auth)
//! GET  /api/order/user         - Caller's COD and paid orders (auth)
//! GET  /api/order/seller       - All COD and paid orders
//!
//! # Webhooks
//! POST /stripe                 - Stripe events (raw body, Stripe-Signature)
//! ```

pub mod address;
pub mod cart;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/set", post(cart::set_quantity))
        .route("/remove", post(cart::remove))
        .route("/update", post(cart::update))
        .route("/merge", post(cart::merge))
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(address::add))
        .route("/get", get(address::list))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/cod", post(orders::place_cod))
        .route("/stripe", post(orders::place_online))
        .route("/user", get(orders::user_orders))
        .route("/seller", get(orders::all_orders))
}

/// Create all routes for the storefront.
///
/// The webhook route sits outside `/api` and needs no session or identity.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/cart", cart_routes())
        .nest("/api/address", address_routes())
        .nest("/api/order", order_routes())
        .route("/stripe", post(webhooks::stripe))
}
