//! Storage traits.
//!
//! Every store is a cheap `Clone` handle (a pool or an `Arc`) so services can
//! own one per request. Futures are `Send` so they can run inside axum
//! handlers.
//!
//! Writes that can race with webhook retries are plain sets: `mark_paid`
//! never reads the current flag, and `clear` overwrites the cart.

use std::future::Future;

use crate::address::{Address, NewAddress};
use crate::cart::CartSnapshot;
use crate::error::StorageError;
use crate::order::{NewOrder, Order};
use crate::types::{OrderId, UserId};

/// Durable server-side cart replicas, one per user.
pub trait CartStore: Clone + Send + Sync {
    /// Load a user's cart. A user without a stored cart has an empty one.
    fn load(&self, user_id: UserId)
    -> impl Future<Output = Result<CartSnapshot, StorageError>> + Send;

    /// Replace a user's cart (last write wins).
    fn save(
        &self,
        user_id: UserId,
        cart: &CartSnapshot,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Empty a user's cart. Idempotent.
    fn clear(&self, user_id: UserId) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Persisted orders.
pub trait OrderStore: Clone + Send + Sync {
    /// Persist a new order together with all of its line items.
    ///
    /// Implementations must write the order atomically: either the order and
    /// every item exist afterwards, or nothing does.
    fn insert(&self, order: NewOrder) -> impl Future<Output = Result<Order, StorageError>> + Send;

    /// Fetch one order.
    fn get(&self, id: OrderId) -> impl Future<Output = Result<Option<Order>, StorageError>> + Send;

    /// Unconditionally set `is_paid = true`.
    ///
    /// Returns whether an order with this ID exists. Re-applying to a paid
    /// order changes nothing observable.
    fn mark_paid(&self, id: OrderId) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// A user's orders that are COD or paid, newest first.
    fn list_visible_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, StorageError>> + Send;

    /// All orders that are COD or paid, newest first.
    fn list_visible(&self) -> impl Future<Output = Result<Vec<Order>, StorageError>> + Send;
}

/// Saved postal addresses.
pub trait AddressStore: Clone + Send + Sync {
    /// Persist a new address.
    fn insert(
        &self,
        address: NewAddress,
    ) -> impl Future<Output = Result<Address, StorageError>> + Send;

    /// A user's addresses, newest first.
    fn list_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Address>, StorageError>> + Send;
}
