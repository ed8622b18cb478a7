//! Session-related types.
//!
//! Guests have no server cart, so their cart lives in the session until they
//! log in and it is merged into the server replica.

use greencart_core::UserId;
use serde::{Deserialize, Serialize};

/// The resolved identity of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User ID from the identity token.
    pub id: UserId,
}

/// Session keys.
pub mod keys {
    /// Guest cart (`LocalReplica`) of an anonymous visitor.
    pub const GUEST_CART: &str = "guest_cart";
}
