//! Notification relay for alarm events.
//!
//! This crate provides:
//! - `Relay`, the entry point for events and all-clears
//! - Tiered trigger expansion and per-key fan-out with per-delivery outcomes
//! - A suppression window for all-clear notifications
//! - `RequestIssuer` trait with an HTTP GET implementation over templated endpoints

pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod issuer;
pub mod query;
pub mod relay;
pub mod tiers;
pub mod validate;

pub use error::{RelayError, TransportError, ValidationError};
pub use fanout::{DeliveryOutcome, DispatchReport};
pub use issuer::{HttpIssuer, RequestIssuer};
pub use relay::{AllClearStatus, Relay};
