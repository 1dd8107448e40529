//! Domain events handed to the relay by the alarm pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Names of the three payload slots, in the order they are sent.
pub const VALUE_SLOTS: [&str; 3] = ["value1", "value2", "value3"];

/// A scalar payload value forwarded to recipients as a query parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Number(f64),
    Text(String),
}

impl PayloadValue {
    /// Zero, NaN and empty text are treated as if the slot were unset.
    pub fn is_blank(&self) -> bool {
        match self {
            PayloadValue::Number(n) => *n == 0.0 || n.is_nan(),
            PayloadValue::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without a trailing ".0".
            PayloadValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            // Very large and very small magnitudes use exponent form, "1e+21", "1.5e-7".
            PayloadValue::Number(n) if n.is_finite() && (n.abs() >= 1e21 || (*n != 0.0 && n.abs() < 1e-6)) => {
                let formatted = format!("{n:e}");
                match formatted.split_once('e') {
                    Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{mantissa}e+{exp}"),
                    _ => f.write_str(&formatted),
                }
            }
            PayloadValue::Number(n) => write!(f, "{n}"),
            PayloadValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<f64> for PayloadValue {
    fn from(n: f64) -> Self {
        PayloadValue::Number(n)
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        PayloadValue::Number(n as f64)
    }
}

/// An event the relay may broadcast, e.g. an alarm being raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Routes the event to the announcement recipients.
    #[serde(default, alias = "isAnnouncement")]
    pub is_announcement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value1: Option<PayloadValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<PayloadValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value3: Option<PayloadValue>,
}

impl NotificationEvent {
    pub fn new(name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            level: Some(level.into()),
            ..Self::default()
        }
    }

    pub fn announcement(mut self) -> Self {
        self.is_announcement = true;
        self
    }

    pub fn with_value1(mut self, value: impl Into<PayloadValue>) -> Self {
        self.value1 = Some(value.into());
        self
    }

    pub fn with_value2(mut self, value: impl Into<PayloadValue>) -> Self {
        self.value2 = Some(value.into());
        self
    }

    pub fn with_value3(mut self, value: impl Into<PayloadValue>) -> Self {
        self.value3 = Some(value.into());
        self
    }

    /// The payload slots paired with their parameter names, in send order.
    pub fn values(&self) -> [(&'static str, Option<&PayloadValue>); 3] {
        [
            (VALUE_SLOTS[0], self.value1.as_ref()),
            (VALUE_SLOTS[1], self.value2.as_ref()),
            (VALUE_SLOTS[2], self.value3.as_ref()),
        ]
    }
}

/// Display text for an all-clear notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllClearNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AllClearNotice {
    pub const DEFAULT_TITLE: &'static str = "All Clear";

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The title, or "All Clear" when unset or empty.
    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(Self::DEFAULT_TITLE)
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_announcement_flag() {
        let event: NotificationEvent = serde_json::from_str(
            r#"{"name":"high","level":"urgent","isAnnouncement":true,"value1":"BG 320","value2":42}"#,
        )
        .unwrap();
        assert_eq!(event.name.as_deref(), Some("high"));
        assert!(event.is_announcement);
        assert_eq!(event.value1, Some(PayloadValue::Text("BG 320".to_string())));
        assert_eq!(event.value2, Some(PayloadValue::Number(42.0)));
        assert_eq!(event.value3, None);
    }

    #[test]
    fn missing_fields_default() {
        let event: NotificationEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event, NotificationEvent::default());
        assert!(!event.is_announcement);
    }

    #[test]
    fn payload_display() {
        assert_eq!(PayloadValue::from(42_i64).to_string(), "42");
        assert_eq!(PayloadValue::from(4.5).to_string(), "4.5");
        assert_eq!(PayloadValue::from("x y").to_string(), "x y");
    }

    #[test]
    fn payload_display_extreme_magnitudes() {
        assert_eq!(PayloadValue::from(1e20).to_string(), "100000000000000000000");
        assert_eq!(PayloadValue::from(1e21).to_string(), "1e+21");
        assert_eq!(PayloadValue::from(-1.5e22).to_string(), "-1.5e+22");
        assert_eq!(PayloadValue::from(1.5e-7).to_string(), "1.5e-7");
        assert_eq!(PayloadValue::from(0.000001).to_string(), "0.000001");
    }

    #[test]
    fn blank_payloads() {
        assert!(PayloadValue::from(0_i64).is_blank());
        assert!(PayloadValue::from("").is_blank());
        assert!(PayloadValue::Number(f64::NAN).is_blank());
        assert!(!PayloadValue::from("0").is_blank());
        assert!(!PayloadValue::from(-1_i64).is_blank());
    }

    #[test]
    fn values_keep_slot_order() {
        let event = NotificationEvent::new("n", "l").with_value3("c").with_value1("a");
        let names: Vec<_> = event.values().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, VALUE_SLOTS);
        assert!(event.values()[1].1.is_none());
    }

    #[test]
    fn all_clear_defaults() {
        let notice = AllClearNotice::default();
        assert_eq!(notice.title(), "All Clear");
        assert_eq!(notice.message(), None);

        let notice = AllClearNotice::new("Back in range").with_message("BG 110");
        assert_eq!(notice.title(), "Back in range");
        assert_eq!(notice.message(), Some("BG 110"));
    }
}
