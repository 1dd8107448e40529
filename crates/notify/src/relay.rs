//! The relay facade: validation, tiering, suppression and fan-out.

use std::sync::Arc;

use beacon_core::{AllClearNotice, NotificationEvent, RelayConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::endpoint::EndpointTemplate;
use crate::error::RelayError;
use crate::fanout::{DeliveryOutcome, DispatchReport, KeyFanout};
use crate::gate::{AllClearResetPolicy, GateState, RateGate};
use crate::issuer::{HttpIssuer, RequestIssuer};
use crate::tiers::{self, ALL_CLEAR_TRIGGER};
use crate::validate::validate;

/// Outcome of an all-clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllClearStatus {
    /// False when the all-clear was suppressed by the window.
    pub sent: bool,
}

/// Standard and announcement recipients. Immutable once built.
#[derive(Debug, Clone)]
pub struct RecipientKeySet {
    standard: Arc<[String]>,
    announcement: Arc<[String]>,
}

impl RecipientKeySet {
    /// `None` when there are no standard keys. Empty announcement keys fall
    /// back to the standard set.
    pub fn new(standard: Vec<String>, announcement: Vec<String>) -> Option<Self> {
        if standard.is_empty() {
            return None;
        }
        let standard: Arc<[String]> = standard.into();
        let announcement = if announcement.is_empty() {
            Arc::clone(&standard)
        } else {
            announcement.into()
        };
        Some(Self {
            standard,
            announcement,
        })
    }

    pub fn select(&self, is_announcement: bool) -> &[String] {
        if is_announcement {
            &self.announcement
        } else {
            &self.standard
        }
    }
}

/// Relays alarm events and all-clears to every configured recipient.
pub struct Relay {
    keys: RecipientKeySet,
    fanout: KeyFanout,
    gate: RateGate,
    reset_policy: AllClearResetPolicy,
}

impl Relay {
    /// Build a relay that sends over HTTP.
    ///
    /// Returns `Ok(None)` when no recipient keys are configured: the relay
    /// is disabled and callers should skip notifications.
    ///
    /// # Errors
    ///
    /// [`RelayError::Config`] for a malformed endpoint template, a zero
    /// request timeout or an HTTP client that cannot be built.
    pub fn create(config: &RelayConfig) -> Result<Option<Self>, RelayError> {
        if !config.is_enabled() {
            tracing::info!("no recipient keys configured, relay disabled");
            return Ok(None);
        }
        let endpoint = EndpointTemplate::new(config.endpoint.as_str())?;
        let issuer = HttpIssuer::new(endpoint, config.request_timeout)?;
        Ok(Self::with_issuer(config, Arc::new(issuer)))
    }

    /// Build a relay on top of any [`RequestIssuer`]. `None` when disabled.
    pub fn with_issuer(config: &RelayConfig, issuer: Arc<dyn RequestIssuer>) -> Option<Self> {
        let keys = RecipientKeySet::new(config.keys.clone(), config.announcement_keys.clone())?;
        Some(Self {
            keys,
            fanout: KeyFanout::new(issuer, config.max_in_flight),
            gate: RateGate::new(config.all_clear_window),
            reset_policy: AllClearResetPolicy::from_flag(config.reset_on_event),
        })
    }

    pub fn reset_policy(&self) -> AllClearResetPolicy {
        self.reset_policy
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// Send `event` at all three granularities to its recipients.
    ///
    /// Validation failures return before any request is made. Delivery
    /// failures do not make this fail; they are listed in the report.
    pub async fn send_event(&self, event: NotificationEvent) -> Result<DispatchReport, RelayError> {
        self.send_event_with(event, |_| {}).await
    }

    /// Like [`send_event`](Self::send_event), calling `on_result` for each
    /// delivery as it completes.
    pub async fn send_event_with<F>(
        &self,
        event: NotificationEvent,
        on_result: F,
    ) -> Result<DispatchReport, RelayError>
    where
        F: FnMut(&DeliveryOutcome) + Send,
    {
        let event = validate(event)?;
        let triggers = tiers::expand(&event);
        let keys = self.keys.select(event.is_announcement);

        tracing::debug!(
            name = event.name(),
            level = event.level(),
            recipients = keys.len(),
            "relaying event"
        );

        let report = self
            .fanout
            .dispatch(keys, event.into_inner(), &triggers, on_result)
            .await;

        if report.all_delivered() && self.reset_policy == AllClearResetPolicy::OnEventSuccess {
            self.gate.arm();
        }

        Ok(report)
    }

    /// Send an all-clear unless one went out within the suppression window.
    pub async fn send_all_clear(
        &self,
        notice: Option<AllClearNotice>,
    ) -> Result<AllClearStatus, RelayError> {
        self.send_all_clear_at(notice, Utc::now()).await
    }

    /// [`send_all_clear`](Self::send_all_clear) with an explicit clock.
    ///
    /// # Errors
    ///
    /// [`RelayError::Delivery`] when any recipient could not be reached;
    /// the gate is re-armed first so the caller may retry right away.
    pub async fn send_all_clear_at(
        &self,
        notice: Option<AllClearNotice>,
        now: DateTime<Utc>,
    ) -> Result<AllClearStatus, RelayError> {
        let Some(permit) = self.gate.try_acquire(now) else {
            return Ok(AllClearStatus { sent: false });
        };

        let event = all_clear_event(&notice.unwrap_or_default(), now);
        let keys = self.keys.select(true);
        let triggers = [ALL_CLEAR_TRIGGER.to_string()];

        let report = self.fanout.dispatch(keys, event, &triggers, |_| {}).await;

        if report.all_delivered() {
            Ok(AllClearStatus { sent: true })
        } else {
            self.gate.rollback(permit);
            Err(RelayError::Delivery(report))
        }
    }
}

/// Event carried by an all-clear.
///
/// `value3` holds the minutes since the epoch so that downstream services
/// do not drop repeated all-clears as duplicates.
fn all_clear_event(notice: &AllClearNotice, now: DateTime<Utc>) -> NotificationEvent {
    let minutes = (now.timestamp_millis() as f64 / 60_000.0).round() as i64;

    let mut event = NotificationEvent::default()
        .announcement()
        .with_value1(notice.title())
        .with_value3(format!("\n{minutes}"));
    if let Some(message) = notice.message() {
        event = event.with_value2(format!("\n{message}"));
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, ValidationError};
    use crate::query;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every request; fails all of them while `failing` is set.
    #[derive(Default)]
    struct RecordingIssuer {
        calls: Mutex<Vec<(String, String, String)>>,
        count: AtomicUsize,
        failing: AtomicBool,
    }

    impl RecordingIssuer {
        fn triggers(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c.1.clone()).collect()
        }

        fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> =
                self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
            keys.sort();
            keys.dedup();
            keys
        }
    }

    #[async_trait::async_trait]
    impl RequestIssuer for RecordingIssuer {
        async fn issue(
            &self,
            key: &str,
            event: &NotificationEvent,
            trigger: &str,
        ) -> Result<u16, TransportError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push((
                key.to_string(),
                trigger.to_string(),
                query::encode(event),
            ));
            if self.failing.load(Ordering::SeqCst) {
                Err(TransportError::Timeout(Duration::from_secs(10)))
            } else {
                Ok(200)
            }
        }

        fn issuer_name(&self) -> &str {
            "recording"
        }
    }

    fn config() -> RelayConfig {
        let mut config = RelayConfig::with_keys(["std-1", "std-2"]);
        config.announcement_keys = vec!["ann-1".to_string()];
        config
    }

    fn relay(config: &RelayConfig) -> (Relay, Arc<RecordingIssuer>) {
        let issuer = Arc::new(RecordingIssuer::default());
        let relay = Relay::with_issuer(config, issuer.clone()).unwrap();
        (relay, issuer)
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn disabled_without_keys() {
        assert!(Relay::create(&RelayConfig::default()).unwrap().is_none());
        let issuer = Arc::new(RecordingIssuer::default());
        assert!(Relay::with_issuer(&RelayConfig::default(), issuer).is_none());
    }

    #[test]
    fn create_rejects_fixed_endpoint() {
        let mut config = config();
        config.endpoint = "https://example.com/hook".to_string();
        assert!(matches!(Relay::create(&config), Err(RelayError::Config(_))));
    }

    #[test]
    fn create_rejects_zero_timeout_from_env() {
        std::env::set_var("BCNZERO_RELAY_KEY", "k1");
        std::env::set_var("BCNZERO_RELAY_REQUEST_TIMEOUT", "0s");
        let config = RelayConfig::for_profile("bcnzero");
        std::env::remove_var("BCNZERO_RELAY_KEY");
        std::env::remove_var("BCNZERO_RELAY_REQUEST_TIMEOUT");

        assert_eq!(config.request_timeout, Duration::ZERO);
        match Relay::create(&config) {
            Err(RelayError::Config(msg)) => assert!(msg.contains("timeout"), "got: {msg}"),
            Err(other) => panic!("expected Config error, got: {other:?}"),
            Ok(_) => panic!("zero timeout accepted"),
        }
    }

    #[test]
    fn create_with_keys_builds_relay() {
        let relay = Relay::create(&config()).unwrap().unwrap();
        assert_eq!(relay.gate_state(), GateState::Armed);
        assert_eq!(relay.reset_policy(), AllClearResetPolicy::OnEventSuccess);
    }

    #[tokio::test]
    async fn invalid_events_never_reach_the_network() {
        let (relay, issuer) = relay(&config());

        let no_name = NotificationEvent {
            level: Some("urgent".to_string()),
            ..NotificationEvent::default()
        };
        let err = relay.send_event(no_name).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(ValidationError::MissingName)));

        let no_level = NotificationEvent {
            name: Some("high".to_string()),
            ..NotificationEvent::default()
        };
        let err = relay.send_event(no_level).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(ValidationError::MissingLevel)));

        assert_eq!(issuer.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn event_fans_out_three_tiers_to_standard_keys() {
        let (relay, issuer) = relay(&config());
        let event = NotificationEvent::new("high", "urgent").with_value1("BG 320");

        let report = relay.send_event(event).await.unwrap();

        assert_eq!(report.len(), 6);
        assert_eq!(issuer.count.load(Ordering::SeqCst), 6);
        assert_eq!(issuer.keys(), vec!["std-1", "std-2"]);
        let triggers = issuer.triggers();
        for trigger in ["ns-event", "ns-urgent", "ns-urgent-high"] {
            assert_eq!(triggers.iter().filter(|t| *t == trigger).count(), 2);
        }
        assert!(issuer
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.2 == "?value1=BG%20320"));
    }

    #[tokio::test]
    async fn announcement_routes_to_announcement_keys() {
        let (relay, issuer) = relay(&config());
        let event = NotificationEvent::new("maintenance", "info").announcement();

        relay.send_event(event).await.unwrap();

        assert_eq!(issuer.count.load(Ordering::SeqCst), 3);
        assert_eq!(issuer.keys(), vec!["ann-1"]);
    }

    #[tokio::test]
    async fn announcement_falls_back_to_standard_keys() {
        let (relay, issuer) = relay(&RelayConfig::with_keys(["std-1", "std-2"]));
        let event = NotificationEvent::new("maintenance", "info").announcement();

        relay.send_event(event).await.unwrap();

        assert_eq!(issuer.count.load(Ordering::SeqCst), 6);
        assert_eq!(issuer.keys(), vec!["std-1", "std-2"]);
    }

    #[tokio::test]
    async fn observer_is_called_per_delivery() {
        let (relay, _issuer) = relay(&config());
        let mut seen = 0;
        relay
            .send_event_with(NotificationEvent::new("high", "urgent"), |_| seen += 1)
            .await
            .unwrap();
        assert_eq!(seen, 6);
    }

    #[tokio::test]
    async fn delivery_failures_are_reported_not_raised() {
        let (relay, issuer) = relay(&config());
        issuer.failing.store(true, Ordering::SeqCst);

        let report = relay.send_event(NotificationEvent::new("high", "urgent")).await.unwrap();

        assert_eq!(report.len(), 6);
        assert_eq!(report.failed(), 6);
    }

    #[tokio::test]
    async fn second_all_clear_within_window_is_suppressed() {
        let (relay, issuer) = relay(&config());

        let first = relay.send_all_clear_at(None, t(0)).await.unwrap();
        let second = relay.send_all_clear_at(None, t(5)).await.unwrap();

        assert_eq!(first, AllClearStatus { sent: true });
        assert_eq!(second, AllClearStatus { sent: false });
        assert_eq!(issuer.count.load(Ordering::SeqCst), 1);
        assert_eq!(issuer.triggers(), vec!["ns-allclear"]);
    }

    #[tokio::test]
    async fn all_clear_goes_out_again_after_window() {
        let (relay, issuer) = relay(&config());

        relay.send_all_clear_at(None, t(0)).await.unwrap();
        let later = relay.send_all_clear_at(None, t(30)).await.unwrap();

        assert!(later.sent);
        assert_eq!(issuer.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_all_clear_rolls_back() {
        let (relay, issuer) = relay(&config());
        issuer.failing.store(true, Ordering::SeqCst);

        let err = relay.send_all_clear_at(None, t(0)).await.unwrap_err();
        assert!(matches!(err, RelayError::Delivery(ref r) if r.failed() == 1));
        assert_eq!(relay.gate_state(), GateState::Armed);

        issuer.failing.store(false, Ordering::SeqCst);
        let retry = relay.send_all_clear_at(None, t(1)).await.unwrap();
        assert!(retry.sent);
        assert_eq!(issuer.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_clear_payload() {
        let (relay, issuer) = relay(&config());
        let notice = AllClearNotice::new("Resolved").with_message("BG back in range");

        relay.send_all_clear_at(Some(notice), t(0)).await.unwrap();

        let calls = issuer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (key, trigger, query) = &calls[0];
        assert_eq!(key, "ann-1");
        assert_eq!(trigger, "ns-allclear");
        let minutes = t(0).timestamp() / 60;
        assert_eq!(
            query,
            &format!("?value1=Resolved&value2=%0ABG%20back%20in%20range&value3=%0A{minutes}")
        );
    }

    #[tokio::test]
    async fn all_clear_defaults_title() {
        let (relay, issuer) = relay(&config());
        relay.send_all_clear_at(None, t(0)).await.unwrap();
        let calls = issuer.calls.lock().unwrap();
        assert!(calls[0].2.starts_with("?value1=All%20Clear&value3="));
    }

    #[tokio::test]
    async fn delivered_event_rearms_all_clear() {
        let (relay, issuer) = relay(&config());

        relay.send_all_clear_at(None, t(0)).await.unwrap();
        relay.send_event(NotificationEvent::new("high", "urgent")).await.unwrap();
        assert_eq!(relay.gate_state(), GateState::Armed);

        let again = relay.send_all_clear_at(None, t(2)).await.unwrap();
        assert!(again.sent);
        assert_eq!(issuer.triggers().iter().filter(|t| *t == "ns-allclear").count(), 2);
    }

    #[tokio::test]
    async fn failed_event_keeps_cooldown() {
        let (relay, issuer) = relay(&config());

        relay.send_all_clear_at(None, t(0)).await.unwrap();
        issuer.failing.store(true, Ordering::SeqCst);
        relay.send_event(NotificationEvent::new("high", "urgent")).await.unwrap();

        assert_eq!(relay.gate_state(), GateState::Cooling(t(0)));
    }

    #[tokio::test]
    async fn never_policy_keeps_cooldown() {
        let mut config = config();
        config.reset_on_event = false;
        let (relay, _issuer) = relay(&config);

        relay.send_all_clear_at(None, t(0)).await.unwrap();
        relay.send_event(NotificationEvent::new("high", "urgent")).await.unwrap();

        assert_eq!(relay.reset_policy(), AllClearResetPolicy::Never);
        assert!(!relay.send_all_clear_at(None, t(2)).await.unwrap().sent);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_all_clears_send_once() {
        let (relay, issuer) = relay(&config());
        let relay = Arc::new(relay);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let relay = relay.clone();
                tokio::spawn(async move { relay.send_all_clear_at(None, t(0)).await.unwrap().sent })
            })
            .collect();

        let mut sent = 0;
        for handle in handles {
            if handle.await.unwrap() {
                sent += 1;
            }
        }
        assert_eq!(sent, 1);
        assert_eq!(issuer.count.load(Ordering::SeqCst), 1);
    }
}
