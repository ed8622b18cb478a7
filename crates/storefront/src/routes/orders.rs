//! Order route handlers.

use axum::{Json, extract::State, http::HeaderMap, http::header::ORIGIN};
use greencart_core::order::{
    CheckoutOutcome, CreateOrder, Order, RequestedItem, list_all_orders, list_user_orders,
};
use greencart_core::{AddressId, PaymentType};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Checkout form. Items are taken from the request, not the stored cart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderForm {
    #[serde(default)]
    pub items: Vec<RequestedItem>,
    #[serde(default, alias = "address")]
    pub address_id: Option<AddressId>,
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub success: bool,
    pub message: &'static str,
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct CheckoutStarted {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub success: bool,
    pub orders: Vec<Order>,
}

/// `POST /api/order/cod`
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn place_cod(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<PlaceOrderForm>,
) -> Result<Json<OrderPlaced>> {
    let outcome = state
        .orders()
        .create_order(CreateOrder {
            user_id: user.id,
            address_id: form.address_id,
            items: form.items,
            payment_type: PaymentType::Cod,
            origin: None,
        })
        .await?;

    let order = outcome.order().clone();
    let order_id = order.id.to_string();
    add_breadcrumb("checkout", "COD order placed", Some(&[("order_id", order_id.as_str())]));

    Ok(Json(OrderPlaced {
        success: true,
        message: "Order Placed Successfully",
        order,
    }))
}

/// `POST /api/order/stripe`
///
/// Redirect URLs are built from the request's `Origin`, falling back to the
/// configured base URL.
#[instrument(skip(state, headers, form), fields(user_id = %user.id))]
pub async fn place_online(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Json(form): Json<PlaceOrderForm>,
) -> Result<Json<CheckoutStarted>> {
    let origin = headers
        .get(ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| state.config().base_url.clone(), str::to_string);

    let outcome = state
        .orders()
        .create_order(CreateOrder {
            user_id: user.id,
            address_id: form.address_id,
            items: form.items,
            payment_type: PaymentType::Online,
            origin: Some(origin),
        })
        .await?;

    let url = match outcome {
        CheckoutOutcome::AwaitingPayment { order, checkout_url } => {
            let order_id = order.id.to_string();
            add_breadcrumb(
                "checkout",
                "Checkout session created",
                Some(&[("order_id", order_id.as_str())]),
            );
            checkout_url
        }
        CheckoutOutcome::Placed { order } => {
            return Err(AppError::Internal(format!(
                "online order {} was settled without checkout",
                order.id
            )));
        }
    };

    Ok(Json(CheckoutStarted { success: true, url }))
}

/// `GET /api/order/user`
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn user_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrderList>> {
    let orders = list_user_orders(&state.order_store(), user.id).await?;
    Ok(Json(OrderList {
        success: true,
        orders,
    }))
}

/// `GET /api/order/seller`
#[instrument(skip(state))]
pub async fn all_orders(State(state): State<AppState>) -> Result<Json<OrderList>> {
    let orders = list_all_orders(&state.order_store()).await?;
    Ok(Json(OrderList {
        success: true,
        orders,
    }))
}
