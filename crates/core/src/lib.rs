//! GreenCart Core - cart, order and payment reconciliation.
//!
//! This crate holds the part of the storefront that has to stay correct under
//! concurrent requests and at-least-once webhook delivery:
//!
//! - [`cart`] - local and server cart replicas and the one-shot login merge
//! - [`catalog`] - product lookup and the `Lenient`/`Strict` pricing policies
//! - [`order`] - turning a cart into a priced, persisted order
//! - [`payment`] - the payment gateway boundary and webhook signature checks
//! - [`webhook`] - the idempotent `PendingPayment -> Paid` transition
//!
//! # Architecture
//!
//! The core crate contains types, traits and pure logic - no database access
//! and no HTTP clients. Storage and the payment gateway are reached through the
//! traits in [`store`] and [`payment`]; the `storefront` crate provides the
//! `PostgreSQL` and Stripe implementations, and [`memory`] provides in-process
//! ones for tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod order;
pub mod payment;
pub mod store;
pub mod types;
pub mod webhook;

pub use error::*;
pub use types::*;
