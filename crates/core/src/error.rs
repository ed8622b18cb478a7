//! Error taxonomy for the reconciliation core.
//!
//! Validation and not-found errors are meant to reach the caller verbatim.
//! Signature, storage and gateway errors carry detail for server-side logs
//! only; the HTTP layer replaces them with a generic message.

use thiserror::Error;

use crate::types::ProductId;

/// Persistence failure in a cart, order or address store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backing store rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be decoded.
    #[error("stored data is corrupted: {0}")]
    DataCorruption(String),
}

/// Failure while looking up products.
///
/// A missing product is not an error at this level; lookups return `None` and
/// the pricing policy decides what that means.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The catalog could not be queried.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Failure creating a hosted checkout session.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The HTTP request to the gateway failed.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The gateway answered with an error status.
    #[error("gateway API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The gateway response could not be understood.
    #[error("gateway response error: {0}")]
    Response(String),

    /// The order cannot be expressed as checkout line items.
    #[error("invalid checkout request: {0}")]
    InvalidRequest(String),
}

/// Webhook signature verification failure.
///
/// Any of these means the payload must not be interpreted at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signature header has no `t=` element.
    #[error("signature header has no timestamp")]
    MissingTimestamp,

    /// The signature header has no `v1=` element.
    #[error("signature header has no v1 signature")]
    MissingSignature,

    /// The `t=` element is not a unix timestamp.
    #[error("invalid signature timestamp")]
    InvalidTimestamp,

    /// The signed timestamp is outside the accepted tolerance.
    #[error("signature timestamp outside tolerance of {tolerance_secs}s")]
    TimestampOutsideTolerance { tolerance_secs: i64 },

    /// No `v1=` signature matched the payload.
    #[error("signature mismatch")]
    Mismatch,

    /// The signing secret could not be used as an HMAC key.
    #[error("invalid signing secret")]
    InvalidSecret,
}

/// Errors from `OrderBuilder::create_order`.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing address or items, or a non-positive quantity.
    #[error("invalid order data: {0}")]
    Validation(String),

    /// A product in the order does not exist. Nothing was persisted.
    #[error("product with id {0} not found")]
    ProductNotFound(ProductId),

    /// Product lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Persisting the order or clearing the cart failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Checkout session creation failed. The pending order stays persisted.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors from processing a payment webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed; nothing was changed.
    #[error("webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    /// The payload was authentic but not a usable event.
    #[error("malformed webhook event: {0}")]
    MalformedEvent(String),

    /// Marking the order paid or clearing the cart failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from cart session operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The one-shot login merge already ran for this session.
    #[error("cart session is already authenticated")]
    AlreadyAuthenticated,

    /// A quantity above what a cart line can hold.
    #[error("quantity {0} is out of range")]
    InvalidQuantity(i64),

    /// Loading the server replica failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
