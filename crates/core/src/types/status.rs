//! Status enums for orders.

use serde::{Deserialize, Serialize};

/// Status label given to every newly created order.
pub const ORDER_PLACED: &str = "Order Placed";

/// How an order is paid.
///
/// Serialized as `"COD"` / `"Online"`; these strings are part of the persisted
/// record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "greencart.payment_type"))]
pub enum PaymentType {
    /// Cash on delivery. The cart is cleared when the order is placed.
    #[serde(rename = "COD")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "COD"))]
    Cod,
    /// Hosted card checkout. The cart is cleared once payment is confirmed.
    #[serde(rename = "Online")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Online"))]
    Online,
}

impl PaymentType {
    /// The persisted string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "COD",
            Self::Online => "Online",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::Cod),
            "Online" => Ok(Self::Online),
            _ => Err(format!("invalid payment type: {s}")),
        }
    }
}

/// Payment lifecycle of an `Online` order.
///
/// `Paid` is terminal. Derived from the persisted `is_paid` flag rather than
/// stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    PendingPayment,
    Paid,
}

impl PaymentState {
    /// Map the persisted flag to a lifecycle state.
    #[must_use]
    pub const fn from_is_paid(is_paid: bool) -> Self {
        if is_paid { Self::Paid } else { Self::PendingPayment }
    }
}
