//! Persistent records: activity log entries and the run state snapshot.
//!
//! Both records are written as plain JSON so other tools sharing the identity
//! directory can read them. Timestamps are local-time ISO-8601 strings kept
//! as text, which lets entries written by other writers round-trip untouched.

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form details attached to an activity entry.
pub type ActivityDetails = Map<String, Value>;

/// One immutable event in the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Event kind, e.g. `moltlaunch` or `moltlaunch_hire`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable summary.
    pub message: String,

    /// ISO-8601 timestamp of when the entry was recorded.
    pub timestamp: String,

    /// Optional structured details (omitted when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ActivityDetails>,
}

impl ActivityEntry {
    /// Create an entry stamped with the current local time.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            timestamp: now_timestamp(),
            details: None,
        }
    }

    /// Attach details. An empty map is treated as no details.
    pub fn with_details(mut self, details: Option<ActivityDetails>) -> Self {
        self.details = details.filter(|d| !d.is_empty());
        self
    }

    /// Convenience for a single `error` detail.
    pub fn with_error(self, error: impl Into<String>) -> Self {
        let mut details = ActivityDetails::new();
        details.insert("error".to_string(), Value::String(error.into()));
        self.with_details(Some(details))
    }

    /// Typed view of an entry written by any tool sharing the log.
    ///
    /// Missing or non-string `type`, `message` and `timestamp` read as empty;
    /// `details` that are not an object read as absent. Extra fields are
    /// ignored here and preserved by the store, which keeps raw values.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            kind: text("type"),
            message: text("message"),
            timestamp: text("timestamp"),
            details: value
                .get("details")
                .and_then(Value::as_object)
                .filter(|d| !d.is_empty())
                .cloned(),
        }
    }

    /// Look up a string detail by key.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.as_ref()?.get(key)?.as_str()
    }
}

/// Snapshot of the last run, overwritten on every completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub last_run: String,
    pub done: bool,
}

impl StateRecord {
    /// A completed-run record stamped now.
    pub fn completed_now() -> Self {
        Self {
            last_run: now_timestamp(),
            done: true,
        }
    }
}

/// Current local time as ISO-8601 with microseconds and UTC offset.
pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// First `max` characters of `s` (Unicode scalar values, not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = ActivityEntry::new("moltlaunch", "Wallet checked");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "moltlaunch");
        assert_eq!(json["message"], "Wallet checked");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_entry_with_error_detail() {
        let entry = ActivityEntry::new("moltlaunch_hire", "Hire attempt").with_error("boom");
        assert_eq!(entry.detail_str("error"), Some("boom"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["details"]["error"], "boom");
    }

    #[test]
    fn test_from_value_tolerates_foreign_shapes() {
        let entry = ActivityEntry::from_value(&serde_json::json!({
            "type": "x",
            "message": "y",
            "details": "plain text",
            "source": "other_tool"
        }));
        assert_eq!(entry.kind, "x");
        assert_eq!(entry.message, "y");
        assert_eq!(entry.timestamp, "");
        assert!(entry.details.is_none());

        let odd = ActivityEntry::from_value(&serde_json::json!(42));
        assert_eq!(odd.kind, "");
        assert_eq!(odd.message, "");
    }

    #[test]
    fn test_from_value_matches_typed_parse() {
        let entry = ActivityEntry::new("moltlaunch", "Hire attempt").with_error("boom");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(ActivityEntry::from_value(&value), entry);
    }

    #[test]
    fn test_empty_details_dropped() {
        let entry = ActivityEntry::new("k", "m").with_details(Some(ActivityDetails::new()));
        assert!(entry.details.is_none());
    }

    #[test]
    fn test_foreign_timestamp_round_trips() {
        // Naive timestamps written by other tools must survive untouched.
        let raw = r#"{"type":"x","message":"y","timestamp":"2026-02-01T10:00:00.123456"}"#;
        let entry: ActivityEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.timestamp, "2026-02-01T10:00:00.123456");
        let back = serde_json::to_string(&entry).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_now_timestamp_parses() {
        let ts = now_timestamp();
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok(), "bad timestamp {ts}");
    }

    #[test]
    fn test_state_record_shape() {
        let state = StateRecord::completed_now();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["done"], true);
        assert!(json["last_run"].is_string());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
