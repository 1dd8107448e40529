//! Outbound request issuing.
//!
//! [`RequestIssuer`] is the seam between the relay logic and the network.
//! [`HttpIssuer`] is the production implementation: one HTTP GET per call,
//! no retries, any received response counts as delivered.

use std::time::Duration;

use beacon_core::config::redact_key;
use beacon_core::NotificationEvent;

use crate::endpoint::EndpointTemplate;
use crate::error::{RelayError, TransportError};
use crate::query;

/// Issues a single notification request to one recipient.
#[async_trait::async_trait]
pub trait RequestIssuer: Send + Sync {
    /// Send `event` to the recipient identified by `key` under `trigger`.
    ///
    /// Returns the HTTP status code of whatever response came back.
    async fn issue(
        &self,
        key: &str,
        event: &NotificationEvent,
        trigger: &str,
    ) -> Result<u16, TransportError>;

    /// Human-readable name for this issuer (e.g., "http").
    fn issuer_name(&self) -> &str;
}

/// Sends notifications as HTTP GET requests to a templated endpoint.
#[derive(Debug)]
pub struct HttpIssuer {
    endpoint: EndpointTemplate,
    timeout: Duration,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl HttpIssuer {
    /// Create an issuer whose requests give up after `timeout`.
    ///
    /// A zero timeout would fail every request, so it is rejected as
    /// [`RelayError::Config`].
    pub fn new(endpoint: EndpointTemplate, timeout: Duration) -> Result<Self, RelayError> {
        if timeout.is_zero() {
            return Err(RelayError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> &EndpointTemplate {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RequestIssuer for HttpIssuer {
    async fn issue(
        &self,
        key: &str,
        event: &NotificationEvent,
        trigger: &str,
    ) -> Result<u16, TransportError> {
        let query = query::encode(event);
        let url = self.endpoint.render(key, trigger, &query)?;

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Http(e)
            }
        })?;
        let status = response.status();

        // Logged with the key redacted; the key is a credential.
        let shown = self.endpoint.render_for_log(&redact_key(key), trigger, &query);
        tracing::debug!(endpoint = %shown, %status, "sent relay request");

        if !status.is_success() {
            tracing::warn!(endpoint = %shown, %status, "recipient returned non-2xx status");
        }

        Ok(status.as_u16())
    }

    fn issuer_name(&self) -> &str {
        "http"
    }
}
