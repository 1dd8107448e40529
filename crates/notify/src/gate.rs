//! Suppression window for all-clear notifications.
//!
//! The gate is `Armed` until an all-clear is let through, then `Cooling`
//! for the configured window. A failed delivery rolls the gate back so the
//! next all-clear can go out immediately.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Whether regular event traffic re-arms the all-clear gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllClearResetPolicy {
    /// A fully delivered event re-arms the gate.
    #[default]
    OnEventSuccess,
    /// Only the window (or a failed all-clear) re-arms the gate.
    Never,
}

impl AllClearResetPolicy {
    pub fn from_flag(reset_on_event: bool) -> Self {
        if reset_on_event {
            Self::OnEventSuccess
        } else {
            Self::Never
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Armed,
    Cooling(DateTime<Utc>),
}

/// Proof that an all-clear was let through at `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePermit {
    since: DateTime<Utc>,
}

impl GatePermit {
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }
}

#[derive(Debug)]
pub struct RateGate {
    window: Duration,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(GateState::Armed),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> GateState {
        *self.lock()
    }

    /// Let an all-clear through at `now` if the gate allows it.
    ///
    /// The check and the move to `Cooling(now)` happen under one lock, so of
    /// two concurrent callers at most one gets a permit.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Option<GatePermit> {
        let mut state = self.lock();
        if let GateState::Cooling(since) = *state {
            let elapsed = now.signed_duration_since(since);
            let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
            if elapsed < window {
                tracing::debug!(
                    "all-clear suppressed ({:.0}s of window remaining)",
                    (window - elapsed).num_milliseconds() as f64 / 1000.0,
                );
                return None;
            }
        }
        *state = GateState::Cooling(now);
        Some(GatePermit { since: now })
    }

    /// Re-arm after a failed delivery.
    ///
    /// No-op if another all-clear has been let through since `permit`.
    pub fn rollback(&self, permit: GatePermit) {
        let mut state = self.lock();
        if *state == GateState::Cooling(permit.since) {
            *state = GateState::Armed;
        }
    }

    /// Re-arm unconditionally.
    pub fn arm(&self) {
        *self.lock() = GateState::Armed;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
