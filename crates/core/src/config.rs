use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoint used when `RELAY_ENDPOINT` is not set (IFTTT maker webhook shape).
pub const DEFAULT_ENDPOINT: &str = "https://maker.ifttt.com/trigger/{{ trigger }}/with/key/{{ key }}";

/// Minimum interval between two delivered all-clear notifications.
pub const DEFAULT_ALL_CLEAR_WINDOW: Duration = Duration::from_secs(30 * 60);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_duration(profile: &str, key: &str, default: Duration) -> Duration {
    match profiled_env_opt(profile, key) {
        Some(raw) => parse_duration(&raw).unwrap_or_else(|| {
            tracing::warn!(key, value = %raw, "unparseable duration, using default");
            default
        }),
        None => default,
    }
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Split a space separated key list, dropping empty entries.
pub fn split_keys(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Shorten a recipient key for logs: keeps the first four characters.
pub fn redact_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if visible.len() == key.len() {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs` (seconds).
/// Components can be combined: "2h30m", "1d12h", "90s". A bare number is
/// read as seconds. Returns `None` if the string is empty or unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_secs: u64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: u64 = num_buf.parse().ok()?;
            num_buf.clear();
            let unit = match ch {
                'd' => 86_400,
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total_secs = total_secs.checked_add(n.checked_mul(unit)?)?;
            found_unit = true;
        }
    }

    if !num_buf.is_empty() {
        // "5m30" is ambiguous
        if found_unit {
            return None;
        }
        total_secs = num_buf.parse().ok()?;
    }

    Some(Duration::from_secs(total_secs))
}

// ── Relay config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    /// Recipient keys used for regular events.
    pub keys: Vec<String>,
    /// Recipient keys used for announcements. Empty falls back to `keys`.
    pub announcement_keys: Vec<String>,
    /// Minijinja template for the request URL; must reference `key` and `trigger`.
    pub endpoint: String,
    pub all_clear_window: Duration,
    pub request_timeout: Duration,
    /// Whether a fully delivered event re-arms the all-clear gate.
    pub reset_on_event: bool,
    /// Upper bound on concurrently in-flight requests (`None` = unbounded).
    pub max_in_flight: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            keys: Vec::new(),
            announcement_keys: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            all_clear_window: DEFAULT_ALL_CLEAR_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reset_on_event: true,
            max_in_flight: None,
        }
    }
}

impl RelayConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `BEACON_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("BEACON_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            keys: split_keys(&profiled_env_or(p, "RELAY_KEY", "")),
            announcement_keys: split_keys(&profiled_env_or(p, "RELAY_ANNOUNCEMENT_KEY", "")),
            endpoint: profiled_env_or(p, "RELAY_ENDPOINT", DEFAULT_ENDPOINT),
            all_clear_window: profiled_env_duration(p, "RELAY_ALLCLEAR_WINDOW", DEFAULT_ALL_CLEAR_WINDOW),
            request_timeout: profiled_env_duration(p, "RELAY_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT),
            reset_on_event: profiled_env_bool(p, "RELAY_RESET_ON_EVENT", true),
            max_in_flight: profiled_env_opt(p, "RELAY_MAX_IN_FLIGHT")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0),
        }
    }

    /// Config with the given standard keys and defaults for everything else.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A relay without standard keys is disabled.
    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Announcement keys, or the standard keys when none are configured.
    pub fn effective_announcement_keys(&self) -> &[String] {
        if self.announcement_keys.is_empty() {
            &self.keys
        } else {
            &self.announcement_keys
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Relay config loaded (profile: {}):", self.profile_label());
        tracing::info!("  keys:         standard={}, announcement={}", self.keys.len(), self.effective_announcement_keys().len());
        tracing::info!("  endpoint:     {}", self.endpoint);
        tracing::info!("  all-clear:    window={}s, reset_on_event={}", self.all_clear_window.as_secs(), self.reset_on_event);
        tracing::info!("  requests:     timeout={}ms, max_in_flight={}", self.request_timeout.as_millis(), self.max_in_flight.map_or("unbounded".to_string(), |n| n.to_string()));
    }

    /// Return a redacted view safe for printing (no full keys).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "enabled": self.is_enabled(),
            "keys": self.keys.iter().map(|k| redact_key(k)).collect::<Vec<_>>(),
            "announcement_keys": self.effective_announcement_keys().iter().map(|k| redact_key(k)).collect::<Vec<_>>(),
            "endpoint": self.endpoint,
            "all_clear_window_secs": self.all_clear_window.as_secs(),
            "request_timeout_ms": self.request_timeout.as_millis() as u64,
            "reset_on_event": self.reset_on_event,
            "max_in_flight": self.max_in_flight,
        })
    }
}
