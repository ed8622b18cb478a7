//! Turning a cart into a priced order.
//!
//! [`OrderBuilder::create_order`] prices every item strictly, applies the
//! surcharge, persists the order and then either clears the cart (COD) or
//! opens a hosted checkout (Online). Online orders stay unpaid until the
//! completion webhook arrives.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::catalog::{Catalog, PricingError, PricingPolicy, base_amount, price_items};
use crate::error::{OrderError, StorageError};
use crate::payment::{
    CheckoutLineItem, CheckoutMetadata, CheckoutRedirects, CheckoutSessionRequest, PaymentGateway,
};
use crate::store::{CartStore, OrderStore};
use crate::types::{
    AddressId, ORDER_PLACED, OrderId, PaymentState, PaymentType, ProductId, UserId,
    apply_surcharge,
};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "productId", alias = "product")]
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// In the order the items were submitted.
    pub items: Vec<OrderItem>,
    /// Surcharged total, fixed at creation.
    pub amount: Decimal,
    pub address_id: AddressId,
    pub status: String,
    pub payment_type: PaymentType,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Payment lifecycle state.
    #[must_use]
    pub const fn payment_state(&self) -> PaymentState {
        PaymentState::from_is_paid(self.is_paid)
    }

    /// COD orders and paid orders show up in order listings; pending Online
    /// orders do not.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.payment_type == PaymentType::Cod || self.is_paid
    }
}

/// An order about to be persisted. Always unpaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub amount: Decimal,
    pub address_id: AddressId,
    pub status: String,
    pub payment_type: PaymentType,
}

/// An item as submitted by the client, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestedItem {
    #[serde(rename = "productId", alias = "product")]
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Input to [`OrderBuilder::create_order`].
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: UserId,
    pub address_id: Option<AddressId>,
    pub items: Vec<RequestedItem>,
    pub payment_type: PaymentType,
    /// Storefront origin used for checkout redirects. Required for Online.
    pub origin: Option<String>,
}

impl CreateOrder {
    fn validate(&self) -> Result<(AddressId, Vec<OrderItem>), OrderError> {
        let address_id = self
            .address_id
            .ok_or_else(|| OrderError::Validation("address is required".into()))?;

        if self.items.is_empty() {
            return Err(OrderError::Validation("order has no items".into()));
        }

        let items = self
            .items
            .iter()
            .map(|item| {
                u32::try_from(item.quantity)
                    .ok()
                    .filter(|&q| q > 0)
                    .map(|quantity| OrderItem {
                        product_id: item.product_id.clone(),
                        quantity,
                    })
                    .ok_or_else(|| {
                        OrderError::Validation(format!(
                            "quantity of {} must be positive",
                            item.product_id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((address_id, items))
    }
}

/// Result of a successful `create_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// COD order placed; the cart has been cleared.
    Placed { order: Order },
    /// Online order persisted unpaid; the customer must complete checkout.
    AwaitingPayment { order: Order, checkout_url: String },
}

impl CheckoutOutcome {
    /// The persisted order.
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Placed { order } | Self::AwaitingPayment { order, .. } => order,
        }
    }
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::ProductNotFound(id) => Self::ProductNotFound(id),
            PricingError::Catalog(e) => Self::Catalog(e),
        }
    }
}

/// Creates orders from submitted items.
#[derive(Debug, Clone)]
pub struct OrderBuilder<C, O, K, G> {
    catalog: C,
    orders: O,
    carts: K,
    gateway: G,
}

impl<C, O, K, G> OrderBuilder<C, O, K, G>
where
    C: Catalog,
    O: OrderStore,
    K: CartStore,
    G: PaymentGateway,
{
    #[must_use]
    pub const fn new(catalog: C, orders: O, carts: K, gateway: G) -> Self {
        Self {
            catalog,
            orders,
            carts,
            gateway,
        }
    }

    /// Price, persist and settle (COD) or hand off (Online) an order.
    ///
    /// Nothing is persisted unless validation and strict pricing both pass.
    ///
    /// # Errors
    ///
    /// - `Validation` for a missing address, no items or a non-positive quantity
    /// - `ProductNotFound` if any product is unknown
    /// - `Catalog` / `Storage` if a collaborator fails
    /// - `Gateway` if checkout cannot be opened; the unpaid order stays stored
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, payment_type = %request.payment_type)
    )]
    pub async fn create_order(&self, request: CreateOrder) -> Result<CheckoutOutcome, OrderError> {
        let (address_id, items) = request.validate()?;

        let redirects = match request.payment_type {
            PaymentType::Cod => None,
            PaymentType::Online => {
                let origin = request.origin.as_deref().ok_or_else(|| {
                    OrderError::Validation("origin is required for online payment".into())
                })?;
                Some(CheckoutRedirects::for_origin(origin))
            }
        };

        let lines = price_items(&self.catalog, &items, PricingPolicy::Strict).await?;
        let amount = apply_surcharge(base_amount(&lines));

        // Built before persisting so an unrepresentable price cannot leave
        // an order behind.
        let line_items = match redirects {
            Some(_) => lines
                .iter()
                .map(CheckoutLineItem::from_priced)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let order = self
            .orders
            .insert(NewOrder {
                user_id: request.user_id,
                items,
                amount,
                address_id,
                status: ORDER_PLACED.to_string(),
                payment_type: request.payment_type,
            })
            .await?;

        info!(order_id = %order.id, %amount, "Order created");

        let Some(redirects) = redirects else {
            self.carts.clear(order.user_id).await?;
            return Ok(CheckoutOutcome::Placed { order });
        };

        let checkout = CheckoutSessionRequest {
            line_items,
            redirects,
            metadata: CheckoutMetadata {
                order_id: order.id,
                user_id: order.user_id,
            },
        };

        let session = self
            .gateway
            .create_checkout_session(&checkout)
            .await
            .inspect_err(|e| {
                error!(
                    order_id = %order.id,
                    error = %e,
                    "Checkout session failed, order left unpaid"
                );
            })?;

        Ok(CheckoutOutcome::AwaitingPayment {
            order,
            checkout_url: session.url,
        })
    }
}

/// A user's COD and paid orders, newest first.
///
/// # Errors
///
/// Returns `StorageError` if the store cannot be read.
pub async fn list_user_orders<O: OrderStore>(
    orders: &O,
    user_id: UserId,
) -> Result<Vec<Order>, StorageError> {
    orders.list_visible_for_user(user_id).await
}

/// Every COD and paid order, newest first (seller view).
///
/// # Errors
///
/// Returns `StorageError` if the store cannot be read.
pub async fn list_all_orders<O: OrderStore>(orders: &O) -> Result<Vec<Order>, StorageError> {
    orders.list_visible().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::cart::CartSnapshot;
    use crate::catalog::Product;
    use crate::memory::{InMemoryCartStore, InMemoryCatalog, InMemoryOrderStore, RecordingGateway};

    type Builder =
        OrderBuilder<InMemoryCatalog, InMemoryOrderStore, InMemoryCartStore, RecordingGateway>;

    struct Fixture {
        builder: Builder,
        orders: InMemoryOrderStore,
        carts: InMemoryCartStore,
        gateway: RecordingGateway,
    }

    const USER: UserId = UserId::new(7);

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn item(id: &str, quantity: i64) -> RequestedItem {
        RequestedItem {
            product_id: pid(id),
            quantity,
        }
    }

    async fn fixture() -> Fixture {
        let catalog = InMemoryCatalog::new();
        catalog.insert(Product {
            id: pid("p1"),
            name: "Apples".to_string(),
            category: "Fruits".to_string(),
            offer_price: dec!(100),
            in_stock: true,
        });
        catalog.insert(Product {
            id: pid("p2"),
            name: "Bread".to_string(),
            category: "Bakery".to_string(),
            offer_price: dec!(9.99),
            in_stock: true,
        });

        let orders = InMemoryOrderStore::new();
        let carts = InMemoryCartStore::new();
        let gateway = RecordingGateway::new();

        let cart: CartSnapshot = [(pid("p1"), 3)].into_iter().collect();
        carts.save(USER, &cart).await.unwrap();

        Fixture {
            builder: OrderBuilder::new(catalog, orders.clone(), carts.clone(), gateway.clone()),
            orders,
            carts,
            gateway,
        }
    }

    fn request(items: Vec<RequestedItem>, payment_type: PaymentType) -> CreateOrder {
        CreateOrder {
            user_id: USER,
            address_id: Some(AddressId::new(1)),
            items,
            payment_type,
            origin: Some("https://shop.example".to_string()),
        }
    }

    #[tokio::test]
    async fn test_cod_order_is_placed_and_cart_cleared() {
        let f = fixture().await;

        let outcome = f
            .builder
            .create_order(request(vec![item("p1", 3)], PaymentType::Cod))
            .await
            .unwrap();

        let CheckoutOutcome::Placed { order } = outcome else {
            panic!("expected a placed order");
        };
        assert_eq!(order.amount, dec!(306));
        assert!(!order.is_paid);
        assert_eq!(order.payment_type, PaymentType::Cod);
        assert_eq!(order.status, ORDER_PLACED);
        assert_eq!(f.orders.len(), 1);
        assert!(f.carts.load(USER).await.unwrap().is_empty());
        assert!(f.gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_product_persists_nothing() {
        let f = fixture().await;

        let err = f
            .builder
            .create_order(request(vec![item("p1", 2), item("p9", 1)], PaymentType::Cod))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ProductNotFound(id) if id.as_str() == "p9"));
        assert_eq!(f.orders.len(), 0);
        assert_eq!(f.carts.load(USER).await.unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let f = fixture().await;

        let mut no_address = request(vec![item("p1", 1)], PaymentType::Cod);
        no_address.address_id = None;
        let empty = request(Vec::new(), PaymentType::Cod);
        let zero = request(vec![item("p1", 0)], PaymentType::Cod);
        let negative = request(vec![item("p1", -2)], PaymentType::Cod);
        let mut no_origin = request(vec![item("p1", 1)], PaymentType::Online);
        no_origin.origin = None;

        for bad in [no_address, empty, zero, negative, no_origin] {
            let err = f.builder.create_order(bad).await.unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)), "got {err:?}");
        }
        assert_eq!(f.orders.len(), 0);
    }

    #[tokio::test]
    async fn test_online_order_opens_checkout_and_keeps_cart() {
        let f = fixture().await;

        let outcome = f
            .builder
            .create_order(request(
                vec![item("p2", 2), item("p1", 1)],
                PaymentType::Online,
            ))
            .await
            .unwrap();

        let CheckoutOutcome::AwaitingPayment {
            order,
            checkout_url,
        } = outcome
        else {
            panic!("expected a checkout hand-off");
        };

        // base = 2 * 9.99 + 100 = 119.98, surcharge floor(2.3996) = 2
        assert_eq!(order.amount, dec!(121.98));
        assert!(!order.is_paid);
        assert!(checkout_url.starts_with("https://"));
        assert_eq!(f.carts.load(USER).await.unwrap().count(), 3);

        let requests = f.gateway.requests();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent.line_items[0].unit_amount, 1018);
        assert_eq!(sent.line_items[0].quantity, 2);
        assert_eq!(sent.line_items[1].unit_amount, 10200);
        assert_eq!(sent.metadata.order_id, order.id);
        assert_eq!(sent.metadata.user_id, USER);
        assert_eq!(sent.redirects.success_url, "https://shop.example/my-orders");
        assert_eq!(sent.redirects.cancel_url, "https://shop.example/cart");
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_pending_order() {
        let f = fixture().await;
        f.gateway.fail(true);

        let err = f
            .builder
            .create_order(request(vec![item("p1", 1)], PaymentType::Online))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Gateway(_)));
        assert_eq!(f.orders.len(), 1);

        // Pending online orders are hidden from listings.
        assert!(list_user_orders(&f.orders, USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_keep_submission_order() {
        let f = fixture().await;

        let order = f
            .builder
            .create_order(request(vec![item("p2", 1), item("p1", 1)], PaymentType::Cod))
            .await
            .unwrap()
            .order()
            .clone();

        let ids: Vec<&str> = order.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, ["p2", "p1"]);
    }

    #[test]
    fn test_order_item_accepts_legacy_product_key() {
        let item: OrderItem =
            serde_json::from_value(serde_json::json!({"product": "p1", "quantity": 2})).unwrap();
        assert_eq!(item.product_id.as_str(), "p1");

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], "p1");
    }
}
