//! Admission check for events entering the relay.

use std::ops::Deref;

use beacon_core::NotificationEvent;

use crate::error::ValidationError;

/// An event known to carry a non-empty name and level.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEvent {
    event: NotificationEvent,
}

impl ValidEvent {
    pub fn name(&self) -> &str {
        self.event.name.as_deref().unwrap_or_default()
    }

    pub fn level(&self) -> &str {
        self.event.level.as_deref().unwrap_or_default()
    }

    pub fn into_inner(self) -> NotificationEvent {
        self.event
    }
}

impl Deref for ValidEvent {
    type Target = NotificationEvent;

    fn deref(&self) -> &NotificationEvent {
        &self.event
    }
}

/// Check that `event` has a name and a level. The name is checked first.
pub fn validate(event: NotificationEvent) -> Result<ValidEvent, ValidationError> {
    if event.name.as_deref().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingName);
    }
    if event.level.as_deref().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingLevel);
    }
    Ok(ValidEvent { event })
}
