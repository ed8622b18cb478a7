//! In-process implementations of the store, catalog and gateway traits.
//!
//! Used by unit and scenario tests, and anywhere a database is not wanted.
//! Every type is a cheap `Clone` handle over shared state, and most can be
//! told to fail so error paths are testable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::address::{Address, NewAddress};
use crate::cart::CartSnapshot;
use crate::catalog::{Catalog, Product};
use crate::error::{CatalogError, GatewayError, StorageError};
use crate::order::{NewOrder, Order};
use crate::payment::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use crate::store::{AddressStore, CartStore, OrderStore};
use crate::types::{AddressId, OrderId, ProductId, UserId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(what: &str) -> StorageError {
    StorageError::Backend(format!("injected {what} failure"))
}

/// Catalog backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product.
    pub fn insert(&self, product: Product) {
        lock(&self.products).insert(product.id.clone(), product);
    }

    /// Delete a product, as if it had been removed from the catalog.
    pub fn remove(&self, id: &ProductId) {
        lock(&self.products).remove(id);
    }

    /// Make every lookup fail until reset.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("injected lookup failure".into()));
        }
        Ok(lock(&self.products).get(id).cloned())
    }
}

/// Server carts keyed by user.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<Mutex<HashMap<UserId, CartSnapshot>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `save` and `clear` fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("cart write"));
        }
        Ok(())
    }
}

impl CartStore for InMemoryCartStore {
    async fn load(&self, user_id: UserId) -> Result<CartSnapshot, StorageError> {
        Ok(lock(&self.carts).get(&user_id).cloned().unwrap_or_default())
    }

    async fn save(&self, user_id: UserId, cart: &CartSnapshot) -> Result<(), StorageError> {
        self.check_writable()?;
        lock(&self.carts).insert(user_id, cart.clone());
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), StorageError> {
        self.check_writable()?;
        lock(&self.carts).insert(user_id, CartSnapshot::new());
        Ok(())
    }
}

/// Orders in insertion order, with sequential IDs starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<Vec<Order>>>,
    last_id: Arc<AtomicI32>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored order, oldest first, regardless of visibility.
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        lock(&self.orders).clone()
    }

    /// Make `insert` and `mark_paid` fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("order write"));
        }
        Ok(())
    }

    fn visible_newest_first(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        lock(&self.orders)
            .iter()
            .rev()
            .filter(|o| o.is_visible() && filter(o))
            .cloned()
            .collect()
    }
}

impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, StorageError> {
        self.check_writable()?;

        let now = Utc::now();
        let id = OrderId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let order = Order {
            id,
            user_id: order.user_id,
            items: order.items,
            amount: order.amount,
            address_id: order.address_id,
            status: order.status,
            payment_type: order.payment_type,
            is_paid: false,
            created_at: now,
            updated_at: now,
        };

        lock(&self.orders).push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StorageError> {
        Ok(lock(&self.orders).iter().find(|o| o.id == id).cloned())
    }

    async fn mark_paid(&self, id: OrderId) -> Result<bool, StorageError> {
        self.check_writable()?;

        let mut orders = lock(&self.orders);
        let Some(order) = orders.iter_mut().find(|o| o.id == id) else {
            return Ok(false);
        };
        if !order.is_paid {
            order.updated_at = Utc::now();
        }
        order.is_paid = true;
        Ok(true)
    }

    async fn list_visible_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StorageError> {
        Ok(self.visible_newest_first(|o| o.user_id == user_id))
    }

    async fn list_visible(&self) -> Result<Vec<Order>, StorageError> {
        Ok(self.visible_newest_first(|_| true))
    }
}

/// Saved addresses with sequential IDs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressStore {
    addresses: Arc<Mutex<Vec<Address>>>,
    last_id: Arc<AtomicI32>,
}

impl InMemoryAddressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AddressStore for InMemoryAddressStore {
    async fn insert(&self, address: NewAddress) -> Result<Address, StorageError> {
        let address = Address {
            id: AddressId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1),
            user_id: address.user_id,
            postal: address.postal,
            created_at: Utc::now(),
        };
        lock(&self.addresses).push(address.clone());
        Ok(address)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, StorageError> {
        Ok(lock(&self.addresses)
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Gateway double that records every request and hands out fake sessions.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    requests: Arc<Mutex<Vec<CheckoutSessionRequest>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        lock(&self.requests).clone()
    }

    /// Make session creation fail until reset. Failed calls are not recorded.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl PaymentGateway for RecordingGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "injected gateway failure".into(),
            });
        }

        let mut requests = lock(&self.requests);
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());

        Ok(CheckoutSession {
            url: format!("https://checkout.example/pay/{id}"),
            id,
        })
    }
}
