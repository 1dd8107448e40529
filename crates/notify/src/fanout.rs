//! Fans one event out to every recipient key.
//!
//! Each key gets its own request task. Outcomes are streamed back one per
//! key as they complete, so a slow or failing recipient never holds up the
//! others. Nothing is retried.

use std::sync::Arc;
use std::time::Instant;

use beacon_core::config::redact_key;
use beacon_core::NotificationEvent;
use tokio::sync::{mpsc, Semaphore};

use crate::error::TransportError;
use crate::issuer::RequestIssuer;

/// Result of one request to one recipient under one trigger.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub key: String,
    pub trigger: String,
    /// Response status, or why no response arrived.
    pub result: Result<u16, TransportError>,
    pub duration_ms: u64,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every outcome of a dispatch, in arrival order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn outcomes(&self) -> &[DeliveryOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// True when every recipient answered.
    pub fn all_delivered(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Launches per-key requests through a shared [`RequestIssuer`].
pub struct KeyFanout {
    issuer: Arc<dyn RequestIssuer>,
    /// Caps concurrently running requests when set.
    limiter: Option<Arc<Semaphore>>,
}

impl KeyFanout {
    pub fn new(issuer: Arc<dyn RequestIssuer>, max_in_flight: Option<usize>) -> Self {
        Self {
            issuer,
            limiter: max_in_flight
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Start one request per key for `trigger`.
    ///
    /// Returns once every request has been started; completions are sent on
    /// `outcomes` as they arrive. With an in-flight bound this waits for a
    /// free slot before starting each request.
    pub async fn fanout(
        &self,
        keys: &[String],
        event: &Arc<NotificationEvent>,
        trigger: &str,
        outcomes: &mpsc::UnboundedSender<DeliveryOutcome>,
    ) {
        for key in keys {
            let permit = match &self.limiter {
                Some(limiter) => limiter.clone().acquire_owned().await.ok(),
                None => None,
            };

            let issuer = Arc::clone(&self.issuer);
            let event = Arc::clone(event);
            let key = key.clone();
            let trigger = trigger.to_string();
            let tx = outcomes.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let start = Instant::now();
                let result = issuer.issue(&key, &event, &trigger).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                // The receiver only goes away when the caller stopped listening.
                let _ = tx.send(DeliveryOutcome {
                    key,
                    trigger,
                    result,
                    duration_ms,
                });
            });
        }
    }

    /// Start every tier in order, then gather all outcomes.
    ///
    /// A tier is fully started before the next one begins, but no tier
    /// waits for the previous tier's responses. Failures never stop later
    /// tiers. `on_result` sees each outcome as it arrives.
    pub async fn dispatch<F>(
        &self,
        keys: &[String],
        event: NotificationEvent,
        triggers: &[String],
        mut on_result: F,
    ) -> DispatchReport
    where
        F: FnMut(&DeliveryOutcome) + Send,
    {
        let event = Arc::new(event);
        let (tx, mut rx) = mpsc::unbounded_channel();

        for trigger in triggers {
            self.fanout(keys, &event, trigger, &tx).await;
        }
        drop(tx);

        let mut report = DispatchReport::default();
        while let Some(outcome) = rx.recv().await {
            match &outcome.result {
                Ok(status) => {
                    tracing::info!(
                        issuer = self.issuer.issuer_name(),
                        trigger = %outcome.trigger,
                        key = %redact_key(&outcome.key),
                        status,
                        duration_ms = outcome.duration_ms,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        issuer = self.issuer.issuer_name(),
                        trigger = %outcome.trigger,
                        key = %redact_key(&outcome.key),
                        error = %e,
                        duration_ms = outcome.duration_ms,
                        "Notification delivery failed"
                    );
                }
            }
            on_result(&outcome);
            report.outcomes.push(outcome);
        }

        report
    }
}
