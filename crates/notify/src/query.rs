//! Query string encoding for event payload values.

use beacon_core::NotificationEvent;

/// Encode `value1..value3` of `event` as a query string.
///
/// Blank values (unset, empty text, zero) are skipped. Returns an empty
/// string when nothing is set, otherwise a string starting with `?`.
pub fn encode(event: &NotificationEvent) -> String {
    let mut query = String::new();

    for (name, value) in event.values() {
        let Some(value) = value.filter(|v| !v.is_blank()) else {
            continue;
        };
        query.push(if query.is_empty() { '?' } else { '&' });
        query.push_str(name);
        query.push('=');
        query.push_str(&urlencoding::encode(&value.to_string()));
    }

    query
}
