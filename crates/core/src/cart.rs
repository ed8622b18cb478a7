//! Shopping cart replicas.
//!
//! A user's cart exists twice: a [`LocalReplica`] held by the client (or by
//! the guest session before login) and a [`ServerReplica`] persisted through
//! a [`CartStore`]. The two are reconciled exactly once, when the user logs
//! in, by [`merge`]. After that every change is applied locally and pushed to
//! the server on a best-effort basis; a failed push is logged and the local
//! copy stays the source of truth until the next successful sync.
//!
//! There is no locking between devices: concurrent writers to the same
//! server replica are last-write-wins.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::catalog::{Catalog, PricedLine, PricingError, PricingPolicy, price_items};
use crate::error::CartError;
use crate::order::OrderItem;
use crate::store::CartStore;
use crate::types::{ProductId, UserId};

/// Mapping of product ID to a positive quantity.
///
/// The only way to build a snapshot is through operations that keep every
/// quantity positive, so a snapshot is always sanitized. Deserializing never
/// fails: invalid entries are dropped and anything that is not a JSON object
/// becomes an empty cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct CartSnapshot(BTreeMap<ProductId, u32>);

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a snapshot from untrusted JSON, keeping only positive integers.
    ///
    /// Integral floats such as `2.0` are accepted; fractions, zero, negatives,
    /// strings, blank keys and quantities above `u32::MAX` are dropped.
    #[must_use]
    pub fn sanitize(raw: &Value) -> Self {
        let Some(entries) = raw.as_object() else {
            return Self::new();
        };

        let items = entries
            .iter()
            .filter_map(|(key, value)| {
                let id = ProductId::parse(key).ok()?;
                let quantity = positive_quantity(value)?;
                Some((id, quantity))
            })
            .collect();

        Self(items)
    }

    /// Parse a serialized snapshot; corrupt input yields an empty cart.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::sanitize(&value),
            Err(e) => {
                debug!(error = %e, "Discarding corrupt cart snapshot");
                Self::new()
            }
        }
    }

    /// Increment a product's quantity by one, creating it at 1.
    pub fn add(&mut self, id: ProductId) {
        let quantity = self.0.entry(id).or_insert(0);
        *quantity = quantity.saturating_add(1);
    }

    /// Set a quantity; zero or negative removes the entry.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` above `u32::MAX`; the cart is
    /// unchanged.
    pub fn set_quantity(&mut self, id: ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.0.remove(&id);
            return Ok(());
        }
        let quantity =
            u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity(quantity))?;
        self.0.insert(id, quantity);
        Ok(())
    }

    /// Remove a product. No-op if absent.
    pub fn remove(&mut self, id: &ProductId) {
        self.0.remove(id);
    }

    /// Quantity of a product (0 if absent).
    #[must_use]
    pub fn quantity(&self, id: &ProductId) -> u32 {
        self.0.get(id).copied().unwrap_or(0)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.values().map(|&q| u64::from(q)).sum()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the cart has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, u32)> {
        self.0.iter().map(|(id, &q)| (id, q))
    }

    /// Convert to checkout line items, in key order.
    #[must_use]
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.iter()
            .map(|(id, quantity)| OrderItem {
                product_id: id.clone(),
                quantity,
            })
            .collect()
    }

    /// Display total: sum of `unit_price * quantity` under the lenient policy.
    ///
    /// Products that no longer exist contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::Catalog` only if the catalog itself cannot be
    /// queried.
    pub async fn amount<C: Catalog>(&self, catalog: &C) -> Result<Decimal, PricingError> {
        let lines = price_items(catalog, &self.to_order_items(), PricingPolicy::Lenient).await?;
        Ok(lines.iter().map(PricedLine::line_total).sum())
    }
}

impl From<Value> for CartSnapshot {
    fn from(value: Value) -> Self {
        Self::sanitize(&value)
    }
}

impl FromIterator<(ProductId, u32)> for CartSnapshot {
    fn from_iter<T: IntoIterator<Item = (ProductId, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().filter(|(_, q)| *q > 0).collect())
    }
}

fn positive_quantity(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|&q| q > 0);
    }

    let n = value.as_f64()?;
    if n.fract() != 0.0 || n < 1.0 || n > f64::from(u32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // range checked above
    Some(n as u32)
}

/// One-shot login merge: start from `local`, then let `server` win every key
/// it holds. Local-only keys are kept.
#[must_use]
pub fn merge(local: &CartSnapshot, server: &CartSnapshot) -> CartSnapshot {
    let mut merged = local.0.clone();
    merged.extend(server.0.iter().map(|(id, &q)| (id.clone(), q)));
    CartSnapshot(merged)
}

/// The client-held copy of a cart.
///
/// May be stale, and before login it belongs to an anonymous session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalReplica(CartSnapshot);

impl LocalReplica {
    /// Wrap a snapshot as the local replica.
    #[must_use]
    pub const fn new(snapshot: CartSnapshot) -> Self {
        Self(snapshot)
    }

    /// The current local contents.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        &self.0
    }

    /// Take the snapshot out of the replica.
    #[must_use]
    pub fn into_snapshot(self) -> CartSnapshot {
        self.0
    }
}

/// The durable copy of a user's cart.
#[derive(Debug, Clone)]
pub struct ServerReplica<S> {
    user_id: UserId,
    store: S,
}

impl<S: CartStore> ServerReplica<S> {
    /// Bind a user's server cart in `store`.
    #[must_use]
    pub const fn new(user_id: UserId, store: S) -> Self {
        Self { user_id, store }
    }

    /// The owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Read the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn load(&self) -> Result<CartSnapshot, crate::StorageError> {
        self.store.load(self.user_id).await
    }

    /// Overwrite the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn store(&self, cart: &CartSnapshot) -> Result<(), crate::StorageError> {
        self.store.save(self.user_id, cart).await
    }
}

/// A cart as seen by one client: the local replica plus, once the user has
/// logged in, the server replica it syncs to.
#[derive(Debug)]
pub struct CartSession<S> {
    local: LocalReplica,
    server: Option<ServerReplica<S>>,
}

impl<S: CartStore> CartSession<S> {
    /// An anonymous session that only has a local replica.
    #[must_use]
    pub const fn guest(local: LocalReplica) -> Self {
        Self {
            local,
            server: None,
        }
    }

    /// Re-open an authenticated session whose merge already happened.
    ///
    /// The server replica is loaded into the local one.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the server cart cannot be read.
    pub async fn resume(server: ServerReplica<S>) -> Result<Self, CartError> {
        let snapshot = server.load().await?;
        Ok(Self {
            local: LocalReplica::new(snapshot),
            server: Some(server),
        })
    }

    /// Transition from anonymous to authenticated.
    ///
    /// Merges the local replica with the stored server cart (server wins),
    /// adopts the result locally and pushes it back. Runs at most once per
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AlreadyAuthenticated` on a second call, or
    /// `CartError::Storage` if the server cart cannot be read. In both cases
    /// the local replica is unchanged.
    #[instrument(skip(self, server), fields(user_id = %server.user_id()))]
    pub async fn authenticate(
        &mut self,
        server: ServerReplica<S>,
    ) -> Result<&CartSnapshot, CartError> {
        if self.server.is_some() {
            return Err(CartError::AlreadyAuthenticated);
        }

        let remote = server.load().await?;
        let merged = merge(self.local.snapshot(), &remote);
        debug!(
            local = self.local.snapshot().len(),
            server = remote.len(),
            merged = merged.len(),
            "Merged guest cart into server cart"
        );

        self.local = LocalReplica::new(merged);
        self.server = Some(server);
        self.push().await;

        Ok(self.local.snapshot())
    }

    /// Whether the login merge has happened.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.server.is_some()
    }

    /// The local replica's contents.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        self.local.snapshot()
    }

    /// Give up the session, returning the local replica.
    #[must_use]
    pub fn into_local(self) -> LocalReplica {
        self.local
    }

    /// Add one unit of a product.
    pub async fn add(&mut self, id: ProductId) {
        self.local.0.add(id);
        self.push().await;
    }

    /// Set a product's quantity; zero or negative removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` above `u32::MAX`; nothing is
    /// pushed.
    pub async fn set_quantity(&mut self, id: ProductId, quantity: i64) -> Result<(), CartError> {
        self.local.0.set_quantity(id, quantity)?;
        self.push().await;
        Ok(())
    }

    /// Remove a product.
    pub async fn remove(&mut self, id: &ProductId) {
        self.local.0.remove(id);
        self.push().await;
    }

    /// Push the local replica to the server, if authenticated.
    ///
    /// Failures are logged and swallowed; the local mutation stands.
    async fn push(&self) {
        let Some(server) = &self.server else {
            return;
        };

        if let Err(e) = server.store(self.local.snapshot()).await {
            warn!(
                user_id = %server.user_id(),
                error = %e,
                "Failed to sync cart to server, keeping local copy"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::InMemoryCartStore;

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn cart(entries: &[(&str, u32)]) -> CartSnapshot {
        entries.iter().map(|(k, q)| (pid(k), *q)).collect()
    }

    #[test]
    fn test_sanitize_drops_invalid_entries() {
        let raw = json!({
            "p1": 2,
            "p2": 0,
            "p3": -1,
            "p4": 1.5,
            "p5": "3",
            "p6": null,
            "p7": 4.0,
            "": 1,
            "p8": 5_000_000_000_u64,
        });

        let sanitized = CartSnapshot::sanitize(&raw);
        assert_eq!(sanitized, cart(&[("p1", 2), ("p7", 4)]));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let raw = json!({"a": 3, "b": -2, "c": 0.25, "d": 1});
        let once = CartSnapshot::sanitize(&raw);
        let twice = CartSnapshot::sanitize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
        assert!(twice.iter().all(|(_, q)| q > 0));
    }

    #[test]
    fn test_sanitize_non_object_is_empty() {
        assert!(CartSnapshot::sanitize(&json!([1, 2])).is_empty());
        assert!(CartSnapshot::sanitize(&json!("p1")).is_empty());
        assert!(CartSnapshot::sanitize(&Value::Null).is_empty());
    }

    #[test]
    fn test_parse_corrupt_snapshot_is_empty() {
        assert!(CartSnapshot::parse("{not json").is_empty());
        assert_eq!(CartSnapshot::parse(r#"{"p1": 2}"#), cart(&[("p1", 2)]));
    }

    #[test]
    fn test_deserialize_never_fails() {
        let snapshot: CartSnapshot = serde_json::from_str(r#"{"p1": "x", "p2": 3}"#).unwrap();
        assert_eq!(snapshot, cart(&[("p2", 3)]));

        let snapshot: CartSnapshot = serde_json::from_str("42").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_add_set_remove() {
        let mut c = CartSnapshot::new();
        c.add(pid("p1"));
        c.add(pid("p1"));
        c.add(pid("p2"));
        assert_eq!(c.quantity(&pid("p1")), 2);
        assert_eq!(c.count(), 3);

        c.set_quantity(pid("p1"), 5).unwrap();
        assert_eq!(c.quantity(&pid("p1")), 5);
        c.set_quantity(pid("p1"), 5).unwrap();
        assert_eq!(c.quantity(&pid("p1")), 5);

        c.set_quantity(pid("p2"), 0).unwrap();
        assert_eq!(c.quantity(&pid("p2")), 0);
        assert_eq!(c.len(), 1);

        c.set_quantity(pid("p1"), -3).unwrap();
        assert!(c.is_empty());

        c.remove(&pid("missing"));
        assert!(c.is_empty());
    }

    #[test]
    fn test_oversized_quantity_is_rejected() {
        let mut c = cart(&[("p1", 2)]);
        let too_many = i64::from(u32::MAX) + 1;

        let err = c.set_quantity(pid("p1"), too_many).unwrap_err();

        assert!(matches!(err, CartError::InvalidQuantity(q) if q == too_many));
        assert_eq!(c.quantity(&pid("p1")), 2);

        c.set_quantity(pid("p1"), i64::from(u32::MAX)).unwrap();
        assert_eq!(c.quantity(&pid("p1")), u32::MAX);
    }

    #[test]
    fn test_merge_server_wins_and_keeps_local_only() {
        let local = cart(&[("a", 1), ("b", 5)]);
        let server = cart(&[("b", 2), ("c", 7)]);

        let merged = merge(&local, &server);

        assert_eq!(merged.quantity(&pid("a")), 1);
        assert_eq!(merged.quantity(&pid("b")), 2);
        assert_eq!(merged.quantity(&pid("c")), 7);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let local = cart(&[("a", 1)]);
        assert_eq!(merge(&local, &CartSnapshot::new()), local);
        assert_eq!(merge(&CartSnapshot::new(), &local), local);
    }

    #[tokio::test]
    async fn test_authenticate_merges_once() {
        let store = InMemoryCartStore::new();
        let user = UserId::new(1);
        store.save(user, &cart(&[("b", 2)])).await.unwrap();

        let mut session = CartSession::guest(LocalReplica::new(cart(&[("a", 1), ("b", 9)])));
        let merged = session
            .authenticate(ServerReplica::new(user, store.clone()))
            .await
            .unwrap()
            .clone();

        assert_eq!(merged, cart(&[("a", 1), ("b", 2)]));
        assert_eq!(store.load(user).await.unwrap(), merged);

        let second = session
            .authenticate(ServerReplica::new(user, store.clone()))
            .await;
        assert!(matches!(second, Err(CartError::AlreadyAuthenticated)));
    }

    #[tokio::test]
    async fn test_repeated_merge_in_fresh_sessions_is_idempotent() {
        let store = InMemoryCartStore::new();
        let user = UserId::new(2);
        store.save(user, &cart(&[("b", 2)])).await.unwrap();
        let client = cart(&[("a", 1), ("b", 9)]);

        let mut results = Vec::new();
        for _ in 0..3 {
            let mut session = CartSession::guest(LocalReplica::new(client.clone()));
            let merged = session
                .authenticate(ServerReplica::new(user, store.clone()))
                .await
                .unwrap()
                .clone();
            results.push(merged);
        }

        let expected = cart(&[("a", 1), ("b", 2)]);
        assert!(results.iter().all(|merged| *merged == expected));
        assert_eq!(store.load(user).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_guest_mutations_stay_local() {
        let mut session: CartSession<InMemoryCartStore> =
            CartSession::guest(LocalReplica::default());
        session.add(pid("p1")).await;
        session.add(pid("p1")).await;
        assert_eq!(session.snapshot().quantity(&pid("p1")), 2);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_authenticated_mutations_are_pushed() {
        let store = InMemoryCartStore::new();
        let user = UserId::new(4);
        let mut session = CartSession::resume(ServerReplica::new(user, store.clone()))
            .await
            .unwrap();

        session.add(pid("p1")).await;
        session.set_quantity(pid("p2"), 3).await.unwrap();
        session.remove(&pid("p1")).await;

        assert_eq!(store.load(user).await.unwrap(), cart(&[("p2", 3)]));
    }

    #[tokio::test]
    async fn test_push_failure_keeps_local_mutation() {
        let store = InMemoryCartStore::new();
        let user = UserId::new(2);
        let mut session = CartSession::resume(ServerReplica::new(user, store.clone()))
            .await
            .unwrap();

        store.fail_writes(true);
        session.add(pid("p1")).await;

        assert_eq!(session.snapshot().quantity(&pid("p1")), 1);
        store.fail_writes(false);
        assert!(store.load(user).await.unwrap().is_empty());
    }
}
