//! Payment gateway boundary.
//!
//! Outbound: [`PaymentGateway::create_checkout_session`] turns a priced order
//! into a hosted checkout page. Inbound: [`verify_and_parse_event`] checks the
//! `Stripe-Signature` header of a webhook delivery before anything in the
//! payload is read.
//!
//! # Signature scheme
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=<hex hmac_sha256(secret, "1700000000.<raw body>")>
//! ```
//!
//! Several `v1` entries may be present (secret rotation); any match is enough.

use std::future::Future;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::catalog::PricedLine;
use crate::error::{GatewayError, SignatureError, WebhookError};
use crate::types::{OrderId, UserId, checkout_unit_amount};

type HmacSha256 = Hmac<Sha256>;

/// Event type sent when a hosted checkout completes.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Maximum age (either direction) of a signed webhook timestamp.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// One line of a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    /// Product name shown to the customer.
    pub name: String,
    /// Surcharged unit price in minor units.
    pub unit_amount: i64,
    pub quantity: u32,
}

impl CheckoutLineItem {
    /// Build a checkout line with the surcharge applied per unit.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` if the unit amount overflows.
    pub fn from_priced(line: &PricedLine) -> Result<Self, GatewayError> {
        let unit_amount = checkout_unit_amount(line.product.offer_price).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "unit price of {} is out of range",
                line.product.id
            ))
        })?;

        Ok(Self {
            name: line.product.name.clone(),
            unit_amount,
            quantity: line.quantity,
        })
    }
}

/// Correlation data embedded in a checkout session and echoed back by the
/// completion webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub order_id: OrderId,
    pub user_id: UserId,
}

impl CheckoutMetadata {
    /// Metadata key for the order ID.
    pub const ORDER_ID_KEY: &'static str = "orderId";
    /// Metadata key for the user ID.
    pub const USER_ID_KEY: &'static str = "userId";

    /// Key/value pairs as sent to the gateway (values are strings).
    #[must_use]
    pub fn to_pairs(&self) -> [(&'static str, String); 2] {
        [
            (Self::ORDER_ID_KEY, self.order_id.to_string()),
            (Self::USER_ID_KEY, self.user_id.to_string()),
        ]
    }

    /// Read metadata back from a checkout session object.
    ///
    /// Accepts IDs as strings (what the gateway echoes) or as numbers.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedEvent` if either ID is missing or invalid.
    pub fn from_session(session: &Value) -> Result<Self, WebhookError> {
        let metadata = session
            .get("metadata")
            .ok_or_else(|| WebhookError::MalformedEvent("session has no metadata".into()))?;

        Ok(Self {
            order_id: metadata_id(metadata, Self::ORDER_ID_KEY)?,
            user_id: metadata_id(metadata, Self::USER_ID_KEY)?,
        })
    }
}

fn metadata_id<T>(metadata: &Value, key: &str) -> Result<T, WebhookError>
where
    T: std::str::FromStr<Err = crate::types::ParseIdError>,
{
    let raw = match metadata.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(WebhookError::MalformedEvent(format!(
                "metadata is missing {key}"
            )));
        }
    };

    raw.parse()
        .map_err(|e: crate::types::ParseIdError| WebhookError::MalformedEvent(e.to_string()))
}

/// Where the hosted checkout sends the customer afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirects {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRedirects {
    /// Success goes to the order history, cancel back to the cart.
    #[must_use]
    pub fn for_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            success_url: format!("{origin}/my-orders"),
            cancel_url: format!("{origin}/cart"),
        }
    }
}

/// Everything needed to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub redirects: CheckoutRedirects,
    pub metadata: CheckoutMetadata,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// URL the customer is redirected to.
    pub url: String,
}

/// Outbound half of the payment gateway. Stateless and never retries.
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> impl Future<Output = Result<CheckoutSession, GatewayError>> + Send;
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Payload of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The object the event is about (a checkout session for completions).
    pub object: Value,
}

impl GatewayEvent {
    /// Whether this is the payment-completion event.
    #[must_use]
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// Correlation metadata of the completed session.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedEvent` if the metadata is unusable.
    pub fn checkout_metadata(&self) -> Result<CheckoutMetadata, WebhookError> {
        CheckoutMetadata::from_session(&self.data.object)
    }
}

/// Build a `Stripe-Signature` header value for `payload`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret cannot key the HMAC.
pub fn sign_payload(
    payload: &[u8],
    secret: &str,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let mac = signed_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Check a `Stripe-Signature` header against the raw payload.
///
/// `now` is a unix timestamp in seconds.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for element in signature_header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp: i64 = timestamp
        .ok_or(SignatureError::MissingTimestamp)?
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;

    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::TimestampOutsideTolerance {
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        });
    }

    let mac = signed_mac(payload, secret, timestamp)?;
    let matched = candidates.into_iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verify a webhook delivery and only then parse it.
///
/// # Errors
///
/// Returns `WebhookError::Signature` if verification fails, or
/// `WebhookError::MalformedEvent` if the authentic payload is not an event.
pub fn verify_and_parse_event(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<GatewayEvent, WebhookError> {
    verify_and_parse_event_at(payload, signature_header, secret, Utc::now().timestamp())
}

/// [`verify_and_parse_event`] with an explicit clock.
///
/// # Errors
///
/// See [`verify_and_parse_event`].
pub fn verify_and_parse_event_at(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> Result<GatewayEvent, WebhookError> {
    verify_signature(payload, signature_header, secret, now)?;
    serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedEvent(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::catalog::Product;
    use crate::types::ProductId;

    const SECRET: &str = "whsec_test_9f8e7d6c5b4a";
    const NOW: i64 = 1_700_000_000;

    fn completed_event() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "metadata": {"orderId": "12", "userId": "7"}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_parses_event() {
        let payload = completed_event();
        let header = sign_payload(&payload, SECRET, NOW).unwrap();

        let event = verify_and_parse_event_at(&payload, &header, SECRET, NOW).unwrap();
        assert!(event.is_checkout_completed());

        let metadata = event.checkout_metadata().unwrap();
        assert_eq!(metadata.order_id, OrderId::new(12));
        assert_eq!(metadata.user_id, UserId::new(7));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let payload = completed_event();
        let header = sign_payload(&payload, SECRET, NOW).unwrap();
        let tampered = String::from_utf8(payload)
            .unwrap()
            .replace("\"12\"", "\"13\"");

        let err = verify_and_parse_event_at(tampered.as_bytes(), &header, SECRET, NOW).unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let payload = completed_event();
        let header = sign_payload(&payload, "whsec_other", NOW).unwrap();
        assert_eq!(
            verify_signature(&payload, &header, SECRET, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_any_v1_candidate_may_match() {
        let payload = completed_event();
        let good = sign_payload(&payload, SECRET, NOW).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={good_sig}");

        assert_eq!(verify_signature(&payload, &header, SECRET, NOW), Ok(()));
    }

    #[test]
    fn test_header_shape_errors() {
        let payload = completed_event();
        assert_eq!(
            verify_signature(&payload, "v1=abc", SECRET, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(&payload, &format!("t={NOW}"), SECRET, NOW),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_signature(&payload, "t=soon,v1=abc", SECRET, NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify_signature(&payload, "", SECRET, NOW),
            Err(SignatureError::MissingTimestamp)
        );
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = completed_event();
        let header = sign_payload(&payload, SECRET, NOW - SIGNATURE_TOLERANCE_SECS - 1).unwrap();
        assert!(matches!(
            verify_signature(&payload, &header, SECRET, NOW),
            Err(SignatureError::TimestampOutsideTolerance { .. })
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_out_of_tolerance() {
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={timestamp},v1=00");
            assert!(matches!(
                verify_signature(b"{}", &header, SECRET, NOW),
                Err(SignatureError::TimestampOutsideTolerance { .. })
            ));
            assert!(matches!(
                verify_and_parse_event(b"{}", &header, SECRET),
                Err(WebhookError::Signature(
                    SignatureError::TimestampOutsideTolerance { .. }
                ))
            ));
        }
    }

    #[test]
    fn test_future_timestamp_within_tolerance_is_accepted() {
        let payload = completed_event();
        let header = sign_payload(&payload, SECRET, NOW + SIGNATURE_TOLERANCE_SECS).unwrap();
        assert!(verify_signature(&payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_authentic_garbage_is_malformed_not_signature_error() {
        let payload = b"not json";
        let header = sign_payload(payload, SECRET, NOW).unwrap();
        let err = verify_and_parse_event_at(payload, &header, SECRET, NOW).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedEvent(_)));
    }

    #[test]
    fn test_metadata_errors() {
        let missing = json!({"id": "cs_1"});
        assert!(CheckoutMetadata::from_session(&missing).is_err());

        let bad_id = json!({"metadata": {"orderId": "abc", "userId": "1"}});
        assert!(CheckoutMetadata::from_session(&bad_id).is_err());

        let numeric = json!({"metadata": {"orderId": 5, "userId": 6}});
        let metadata = CheckoutMetadata::from_session(&numeric).unwrap();
        assert_eq!(metadata.order_id, OrderId::new(5));
    }

    #[test]
    fn test_metadata_pairs_are_strings() {
        let metadata = CheckoutMetadata {
            order_id: OrderId::new(12),
            user_id: UserId::new(7),
        };
        assert_eq!(
            metadata.to_pairs(),
            [("orderId", "12".to_string()), ("userId", "7".to_string())]
        );
    }

    #[test]
    fn test_line_item_applies_per_unit_surcharge() {
        let line = PricedLine {
            product: Product {
                id: ProductId::parse("p1").unwrap(),
                name: "Apples".to_string(),
                category: "Fruits".to_string(),
                offer_price: dec!(9.99),
                in_stock: true,
            },
            quantity: 3,
        };

        let item = CheckoutLineItem::from_priced(&line).unwrap();
        assert_eq!(item.unit_amount, 1018);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.name, "Apples");
    }

    #[test]
    fn test_redirects_for_origin() {
        let redirects = CheckoutRedirects::for_origin("https://shop.example/");
        assert_eq!(redirects.success_url, "https://shop.example/my-orders");
        assert_eq!(redirects.cancel_url, "https://shop.example/cart");
    }
}
