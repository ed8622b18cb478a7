//! Newtype IDs for type-safe entity references.
//!
//! Numeric IDs are database-assigned (`SERIAL`) and created with the
//! `define_id!` macro. Product IDs are opaque strings owned by the catalog and
//! double as cart keys, so they get their own type.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when an ID cannot be parsed from text.
///
/// Webhook metadata carries IDs as strings, so parsing has to be fallible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseIdError {
    /// Which ID type was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Define a type-safe numeric ID wrapper.
///
/// The generated type wraps an `i32`, serializes transparently, parses from
/// decimal text and maps to `INTEGER` columns when the `postgres` feature is on.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i32>()
                    .map(Self)
                    .map_err(|_| $crate::types::id::ParseIdError {
                        kind: stringify!($name),
                        value: s.to_owned(),
                    })
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(OrderId);
define_id!(AddressId);

/// Catalog product identifier.
///
/// Opaque to the core; the only rule is that it is not blank. Cart snapshots
/// are keyed by this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Parse a product ID, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, ParseIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                kind: "ProductId",
                value: s.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProductId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id_parses_metadata_strings() {
        assert_eq!("42".parse::<OrderId>().unwrap(), OrderId::new(42));
        assert_eq!(" 7 ".parse::<UserId>().unwrap(), UserId::new(7));

        let err = "abc".parse::<OrderId>().unwrap_err();
        assert_eq!(err.kind, "OrderId");
        assert_eq!(err.value, "abc");
    }

    #[test]
    fn test_numeric_id_serializes_transparently() {
        let json = serde_json::to_string(&AddressId::new(3)).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_product_id_rejects_blank() {
        assert!(ProductId::parse("").is_err());
        assert!(ProductId::parse("   ").is_err());
        assert_eq!(ProductId::parse(" p1 ").unwrap().as_str(), "p1");
    }

    #[test]
    fn test_product_id_deserialize_validates() {
        let ok: ProductId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(ok.as_str(), "p1");
        assert!(serde_json::from_str::<ProductId>("\"\"").is_err());
    }
}
