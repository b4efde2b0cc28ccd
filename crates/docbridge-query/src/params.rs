//! Lenient parameter helpers
//!
//! Request parameters arrive as loosely typed text. These helpers convert
//! them without ever failing; a bad value becomes the caller's default.

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::{Uuid, Variant};

/// Parse JSON text, returning `default` when the text is absent, blank or invalid
#[must_use]
pub fn safe_json_loads(text: Option<&str>, default: Value) -> Value {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return default;
    };

    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("JSON parse failed: {}, data: {}", e, truncate(text, 200));
            default
        }
    }
}

/// Parse an integer, returning `default` when the text is absent or not an integer
#[must_use]
pub fn safe_int_convert(text: Option<&str>, default: i64) -> i64 {
    text.and_then(|t| t.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Check the canonical hyphenated form of an RFC 4122 UUID, versions 1 to 5
#[must_use]
pub fn validate_uuid(text: &str) -> bool {
    if text.len() != 36 {
        return false;
    }
    match Uuid::try_parse(text) {
        Ok(id) => matches!(id.get_version_num(), 1..=5) && id.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}

/// Fresh random key value
#[must_use]
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Drop null values and empty strings
#[must_use]
pub fn sanitize_data(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .collect()
}

/// Current time in milliseconds since the epoch
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Out-of-range values are rendered as the raw number.
#[must_use]
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
