//! Trigger names for the three broadcast granularities.
//!
//! Recipients match trigger names exactly, so every event goes out as a
//! generic trigger, a level trigger and a level+name trigger and each
//! recipient subscribes to whichever it cares about.

use crate::validate::ValidEvent;

/// Trigger sent for every event.
pub const GENERIC_TRIGGER: &str = "ns-event";

/// Trigger used for all-clear notifications.
pub const ALL_CLEAR_TRIGGER: &str = "ns-allclear";

/// Trigger names for `event`, in dispatch order.
pub fn expand(event: &ValidEvent) -> [String; 3] {
    [
        GENERIC_TRIGGER.to_string(),
        level_trigger(event.level()),
        level_name_trigger(Some(event.level()), event.name()),
    ]
}

fn level_trigger(level: &str) -> String {
    format!("ns-{level}")
}

fn level_name_trigger(level: Option<&str>, name: &str) -> String {
    match level.filter(|l| !l.is_empty()) {
        Some(level) => format!("ns-{level}-{name}"),
        None => format!("ns-{name}"),
    }
}
