//! Core types for GreenCart.
//!
//! This module provides type-safe wrappers for identifiers, money and the
//! small enums that end up in persisted records.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::*;
pub use status::*;
