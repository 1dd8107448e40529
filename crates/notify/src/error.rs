//! Error types shared across the relay.

use std::time::Duration;

use crate::fanout::DispatchReport;

/// Reasons an event is rejected before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No event name found")]
    MissingName,

    #[error("No event level found")]
    MissingLevel,
}

/// Failure of a single outbound request. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// Errors surfaced by the [`Relay`](crate::Relay) entry points.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} of {} deliveries failed", .0.failed(), .0.len())]
    Delivery(DispatchReport),
}
