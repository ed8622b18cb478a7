//! Scenario tests for GreenCart.
//!
//! Every scenario runs against the in-memory stores and the recording
//! gateway from `greencart_core::memory`, so no database or network is
//! needed.
//!
//! ```bash
//! cargo test -p greencart-integration-tests
//! ```

use chrono::Utc;
use greencart_core::catalog::Product;
use greencart_core::memory::{
    InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore, RecordingGateway,
};
use greencart_core::order::{CreateOrder, OrderBuilder, RequestedItem};
use greencart_core::payment::sign_payload;
use greencart_core::webhook::WebhookReconciler;
use greencart_core::{AddressId, OrderId, PaymentType, ProductId, UserId};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;

/// Webhook signing secret shared by the shop and the fake gateway.
pub const WEBHOOK_SECRET: &str = "whsec_scenario_secret";

/// Storefront origin used for checkout redirects.
pub const ORIGIN: &str = "https://shop.example";

pub type Builder =
    OrderBuilder<InMemoryCatalog, InMemoryOrderStore, InMemoryCartStore, RecordingGateway>;
pub type Reconciler = WebhookReconciler<InMemoryOrderStore, InMemoryCartStore>;

/// A complete in-memory shop.
pub struct Shop {
    pub catalog: InMemoryCatalog,
    pub orders: InMemoryOrderStore,
    pub carts: InMemoryCartStore,
    pub gateway: RecordingGateway,
    pub builder: Builder,
    pub reconciler: Reconciler,
}

impl Shop {
    #[must_use]
    pub fn new() -> Self {
        let catalog = InMemoryCatalog::new();
        let orders = InMemoryOrderStore::new();
        let carts = InMemoryCartStore::new();
        let gateway = RecordingGateway::new();

        Self {
            builder: OrderBuilder::new(
                catalog.clone(),
                orders.clone(),
                carts.clone(),
                gateway.clone(),
            ),
            reconciler: WebhookReconciler::new(
                orders.clone(),
                carts.clone(),
                SecretString::from(WEBHOOK_SECRET.to_string()),
            ),
            catalog,
            orders,
            carts,
            gateway,
        }
    }

    /// Stock a product at the given offer price.
    pub fn stock(&self, id: &str, offer_price: Decimal) -> ProductId {
        let id = product(id);
        self.catalog.insert(Product {
            id: id.clone(),
            name: format!("Product {id}"),
            category: "Produce".to_string(),
            offer_price,
            in_stock: true,
        });
        id
    }
}

impl Default for Shop {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a product ID, panicking on blank input.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn product(id: &str) -> ProductId {
    ProductId::parse(id).unwrap()
}

/// An order request for `user` shipping to address 1.
#[must_use]
pub fn order_request(
    user: UserId,
    payment_type: PaymentType,
    items: &[(&str, i64)],
) -> CreateOrder {
    CreateOrder {
        user_id: user,
        address_id: Some(AddressId::new(1)),
        items: items
            .iter()
            .map(|(id, quantity)| RequestedItem {
                product_id: product(id),
                quantity: *quantity,
            })
            .collect(),
        payment_type,
        origin: Some(ORIGIN.to_string()),
    }
}

/// A `checkout.session.completed` event body as the gateway sends it.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn completed_event(order_id: OrderId, user_id: UserId) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{order_id}"),
        "type": "checkout.session.completed",
        "data": {"object": {
            "object": "checkout.session",
            "payment_status": "paid",
            "metadata": {
                "orderId": order_id.to_string(),
                "userId": user_id.to_string(),
            }
        }}
    }))
    .unwrap()
}

/// Sign a payload the way the gateway does, timestamped now.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn sign(payload: &[u8]) -> String {
    sign_payload(payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap()
}
