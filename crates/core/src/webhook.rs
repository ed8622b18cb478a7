//! Payment webhook reconciliation.
//!
//! The gateway delivers completion events at least once. Handling one is a
//! pair of idempotent sets (order paid, cart empty), so a redelivery changes
//! nothing and is still acknowledged.

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use crate::error::WebhookError;
use crate::payment::verify_and_parse_event;
use crate::store::{CartStore, OrderStore};
use crate::types::{OrderId, UserId};

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order is now (or already was) paid and the cart is cleared.
    Paid {
        order_id: OrderId,
        user_id: UserId,
        /// Whether the order exists. A missing order is still acknowledged.
        order_found: bool,
    },
    /// An event type we do not act on.
    Ignored { event_type: String },
}

/// Applies verified gateway events to orders and carts.
#[derive(Debug, Clone)]
pub struct WebhookReconciler<O, K> {
    orders: O,
    carts: K,
    secret: SecretString,
}

impl<O: OrderStore, K: CartStore> WebhookReconciler<O, K> {
    #[must_use]
    pub const fn new(orders: O, carts: K, secret: SecretString) -> Self {
        Self {
            orders,
            carts,
            secret,
        }
    }

    /// Verify and apply one delivery.
    ///
    /// # Errors
    ///
    /// - `Signature` if the delivery is not authentic; nothing is changed
    /// - `MalformedEvent` if an authentic completion event lacks its metadata
    /// - `Storage` if a write fails; the gateway will redeliver
    #[instrument(skip_all)]
    pub async fn reconcile(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let event = verify_and_parse_event(payload, signature_header, self.secret.expose_secret())
            .inspect_err(|e| {
                if matches!(e, WebhookError::Signature(_)) {
                    warn!(error = %e, "Rejected webhook with invalid signature, possible forgery");
                }
            })?;

        if !event.is_checkout_completed() {
            info!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            return Ok(ReconcileOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let metadata = event.checkout_metadata()?;

        let order_found = self.orders.mark_paid(metadata.order_id).await?;
        if !order_found {
            warn!(order_id = %metadata.order_id, "Payment completed for unknown order");
        }
        self.carts.clear(metadata.user_id).await?;

        info!(
            event_id = %event.id,
            order_id = %metadata.order_id,
            user_id = %metadata.user_id,
            "Order marked paid"
        );

        Ok(ReconcileOutcome::Paid {
            order_id: metadata.order_id,
            user_id: metadata.user_id,
            order_found,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::cart::CartSnapshot;
    use crate::memory::{InMemoryCartStore, InMemoryOrderStore};
    use crate::order::{NewOrder, OrderItem};
    use crate::payment::sign_payload;
    use crate::types::{AddressId, ORDER_PLACED, PaymentType, ProductId};

    const SECRET: &str = "whsec_reconciler_test_secret";
    const USER: UserId = UserId::new(3);

    async fn setup() -> (
        WebhookReconciler<InMemoryOrderStore, InMemoryCartStore>,
        InMemoryOrderStore,
        InMemoryCartStore,
        OrderId,
    ) {
        let orders = InMemoryOrderStore::new();
        let carts = InMemoryCartStore::new();

        let order = orders
            .insert(NewOrder {
                user_id: USER,
                items: vec![OrderItem {
                    product_id: ProductId::parse("p1").unwrap(),
                    quantity: 1,
                }],
                amount: dec!(102),
                address_id: AddressId::new(1),
                status: ORDER_PLACED.to_string(),
                payment_type: PaymentType::Online,
            })
            .await
            .unwrap();

        let cart: CartSnapshot = [(ProductId::parse("p1").unwrap(), 1)].into_iter().collect();
        carts.save(USER, &cart).await.unwrap();

        let reconciler = WebhookReconciler::new(
            orders.clone(),
            carts.clone(),
            SecretString::from(SECRET.to_string()),
        );
        (reconciler, orders, carts, order.id)
    }

    fn event(event_type: &str, order_id: OrderId) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_42",
            "type": event_type,
            "data": {"object": {"metadata": {
                "orderId": order_id.to_string(),
                "userId": USER.to_string(),
            }}}
        }))
        .unwrap()
    }

    fn sign(payload: &[u8]) -> String {
        sign_payload(payload, SECRET, Utc::now().timestamp()).unwrap()
    }

    #[tokio::test]
    async fn test_redelivery_is_a_no_op() {
        let (reconciler, orders, carts, order_id) = setup().await;
        let payload = event("checkout.session.completed", order_id);
        let header = sign(&payload);

        let first = reconciler.reconcile(&payload, &header).await.unwrap();
        let after_first = orders.get(order_id).await.unwrap().unwrap();
        let second = reconciler.reconcile(&payload, &header).await.unwrap();
        let after_second = orders.get(order_id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert!(after_first.is_paid);
        assert_eq!(after_first, after_second);
        assert_eq!(orders.len(), 1);
        assert!(carts.load(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_settle_once() {
        let (reconciler, orders, carts, order_id) = setup().await;
        let payload = event("checkout.session.completed", order_id);
        let header = sign(&payload);
        let deliver = || reconciler.reconcile(&payload, &header);

        let first_wave = tokio::join!(deliver(), deliver(), deliver(), deliver());
        let after_first = orders.get(order_id).await.unwrap().unwrap();

        let refilled: CartSnapshot = [(ProductId::parse("p2").unwrap(), 1)].into_iter().collect();
        carts.save(USER, &refilled).await.unwrap();
        let second_wave = tokio::join!(deliver(), deliver(), deliver());
        let after_second = orders.get(order_id).await.unwrap().unwrap();

        let expected = ReconcileOutcome::Paid {
            order_id,
            user_id: USER,
            order_found: true,
        };
        for outcome in [
            first_wave.0,
            first_wave.1,
            first_wave.2,
            first_wave.3,
            second_wave.0,
            second_wave.1,
            second_wave.2,
        ] {
            assert_eq!(outcome.unwrap(), expected);
        }

        assert_eq!(orders.len(), 1);
        assert!(after_first.is_paid);
        assert_eq!(after_first.updated_at, after_second.updated_at);
        assert_eq!(after_first, after_second);
        assert!(carts.load(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_signature_changes_nothing() {
        let (reconciler, orders, carts, order_id) = setup().await;
        let payload = event("checkout.session.completed", order_id);
        let header = sign(b"something else entirely");

        let err = reconciler.reconcile(&payload, &header).await.unwrap_err();

        assert!(matches!(err, WebhookError::Signature(_)));
        assert!(!orders.get(order_id).await.unwrap().unwrap().is_paid);
        assert_eq!(carts.load(USER).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_other_event_types_are_acknowledged() {
        let (reconciler, orders, _, order_id) = setup().await;
        let payload = event("payment_intent.created", order_id);

        let outcome = reconciler.reconcile(&payload, &sign(&payload)).await.unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                event_type: "payment_intent.created".to_string()
            }
        );
        assert!(!orders.get(order_id).await.unwrap().unwrap().is_paid);
    }

    #[tokio::test]
    async fn test_unknown_order_is_acknowledged() {
        let (reconciler, _, carts, _) = setup().await;
        let payload = event("checkout.session.completed", OrderId::new(999));

        let outcome = reconciler.reconcile(&payload, &sign(&payload)).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Paid {
                order_found: false,
                ..
            }
        ));
        assert!(carts.load(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_for_redelivery() {
        let (reconciler, orders, carts, order_id) = setup().await;
        carts.fail_writes(true);
        let payload = event("checkout.session.completed", order_id);

        let err = reconciler.reconcile(&payload, &sign(&payload)).await.unwrap_err();
        assert!(matches!(err, WebhookError::Storage(_)));

        carts.fail_writes(false);
        reconciler.reconcile(&payload, &sign(&payload)).await.unwrap();
        assert!(orders.get(order_id).await.unwrap().unwrap().is_paid);
        assert!(carts.load(USER).await.unwrap().is_empty());
    }
}
