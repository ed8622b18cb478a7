//! Shipping addresses.
//!
//! Addresses are created by the user before checkout and only referenced by
//! orders afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AddressId, UserId};

/// Maximum length of any single postal field.
const MAX_FIELD_LENGTH: usize = 200;

/// Validation errors for postal fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// A required field is empty.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A field exceeds the length limit.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// The email does not look like `local@domain`.
    #[error("email address is invalid")]
    InvalidEmail,
}

/// Structured postal fields as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    /// Kept as text so leading zeros survive.
    pub zipcode: String,
    pub country: String,
    pub phone: String,
}

impl PostalAddress {
    /// Check that every field is present and the email is plausible.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<(), AddressError> {
        let fields = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
            ("country", &self.country),
            ("phone", &self.phone),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AddressError::Missing(name));
            }
            if value.chars().count() > MAX_FIELD_LENGTH {
                return Err(AddressError::TooLong {
                    field: name,
                    max: MAX_FIELD_LENGTH,
                });
            }
        }

        match self.email.trim().split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(AddressError::InvalidEmail),
        }
    }
}

/// An address about to be persisted.
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub user_id: UserId,
    pub postal: PostalAddress,
}

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub postal: PostalAddress,
    pub created_at: DateTime<Utc>,
}
