//! Cart route handlers.
//!
//! Guests keep their cart in the session. Authenticated users work against the
//! server replica; the first authenticated request that still carries a guest
//! cart merges it in (server wins) and drops it from the session.

use axum::{Json, extract::State};
use greencart_core::cart::{CartSession, CartSnapshot, LocalReplica, ServerReplica};
use greencart_core::store::CartStore;
use greencart_core::{ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;
use tracing::{debug, instrument};

use crate::db::PgCartStore;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::session_keys;
use crate::state::AppState;

/// Cart contents with display totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub success: bool,
    pub cart_items: CartSnapshot,
    /// Total number of units.
    pub count: u64,
    /// Lenient total; products missing from the catalog count as zero.
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemForm {
    pub item_id: ProductId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQuantityForm {
    pub item_id: ProductId,
    pub quantity: i64,
}

/// A whole cart as sent by the client. Sanitized on arrival.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemsForm {
    #[serde(default)]
    pub cart_items: Value,
}

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

async fn guest_cart(session: &Session) -> LocalReplica {
    session
        .get::<LocalReplica>(session_keys::GUEST_CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Open the caller's cart, promoting a pending guest cart on first login.
async fn open_cart(
    state: &AppState,
    session: &Session,
    user: Option<UserId>,
) -> Result<CartSession<PgCartStore>> {
    let local = guest_cart(session).await;

    let Some(user_id) = user else {
        return Ok(CartSession::guest(local));
    };

    let server = ServerReplica::new(user_id, state.carts());
    if local.snapshot().is_empty() {
        return Ok(CartSession::resume(server).await?);
    }

    let mut cart = CartSession::guest(local);
    cart.authenticate(server).await?;
    session
        .remove::<LocalReplica>(session_keys::GUEST_CART)
        .await
        .map_err(|e| session_error(&e))?;
    debug!(%user_id, "Promoted guest cart");

    Ok(cart)
}

/// Persist a guest cart back into the session. Server carts push themselves.
async fn close_cart(session: &Session, cart: CartSession<PgCartStore>) -> Result<CartSnapshot> {
    if cart.is_authenticated() {
        return Ok(cart.snapshot().clone());
    }

    let local = cart.into_local();
    session
        .insert(session_keys::GUEST_CART, &local)
        .await
        .map_err(|e| session_error(&e))?;
    Ok(local.into_snapshot())
}

async fn respond(state: &AppState, cart: CartSnapshot) -> Result<Json<CartResponse>> {
    let amount = cart
        .amount(state.display_catalog())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(CartResponse {
        success: true,
        count: cart.count(),
        amount,
        cart_items: cart,
    }))
}

/// `GET /api/cart`
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartResponse>> {
    let cart = open_cart(&state, &session, user.map(|u| u.id)).await?;
    let snapshot = close_cart(&session, cart).await?;
    respond(&state, snapshot).await
}

/// `POST /api/cart/add`
#[instrument(skip(state, session, user), fields(item_id = %form.item_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<ItemForm>,
) -> Result<Json<CartResponse>> {
    let mut cart = open_cart(&state, &session, user.map(|u| u.id)).await?;
    cart.add(form.item_id).await;
    let snapshot = close_cart(&session, cart).await?;
    respond(&state, snapshot).await
}

/// `POST /api/cart/set`
#[instrument(skip(state, session, user), fields(item_id = %form.item_id, quantity = form.quantity))]
pub async fn set_quantity(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<SetQuantityForm>,
) -> Result<Json<CartResponse>> {
    let mut cart = open_cart(&state, &session, user.map(|u| u.id)).await?;
    cart.set_quantity(form.item_id, form.quantity).await?;
    let snapshot = close_cart(&session, cart).await?;
    respond(&state, snapshot).await
}

/// `POST /api/cart/remove`
#[instrument(skip(state, session, user), fields(item_id = %form.item_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<ItemForm>,
) -> Result<Json<CartResponse>> {
    let mut cart = open_cart(&state, &session, user.map(|u| u.id)).await?;
    cart.remove(&form.item_id).await;
    let snapshot = close_cart(&session, cart).await?;
    respond(&state, snapshot).await
}

/// `POST /api/cart/update`
///
/// Replace the server cart with the client's copy. Unlike the per-item routes
/// a failed write is reported, since the client asked for exactly this write.
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<CartItemsForm>,
) -> Result<Json<CartResponse>> {
    let cart = CartSnapshot::sanitize(&form.cart_items);
    state.carts().save(user.id, &cart).await?;
    respond(&state, cart).await
}

/// `POST /api/cart/merge`
///
/// Merge a client-held cart into the server cart (server wins).
///
/// Every request merges afresh, so repeating it with the same cart changes
/// nothing further.
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn merge(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<CartItemsForm>,
) -> Result<Json<CartResponse>> {
    let local = LocalReplica::new(CartSnapshot::sanitize(&form.cart_items));
    let mut cart = CartSession::guest(local);
    let merged = cart
        .authenticate(ServerReplica::new(user.id, state.carts()))
        .await?
        .clone();
    respond(&state, merged).await
}
