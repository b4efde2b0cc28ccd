//! Query filter construction
//!
//! Filters are built as JSON objects and only converted to BSON at the store
//! boundary. Two shorthand spellings are recognized on top of native
//! operator documents:
//! - `<field>_contains`: case-insensitive substring match on `<field>`
//! - `created_after` / `created_before`: inclusive range on `created_at`

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::params::sanitize_data;
use crate::CREATED_AT;

const CONTAINS_SUFFIX: &str = "_contains";
const CREATED_AFTER: &str = "created_after";
const CREATED_BEFORE: &str = "created_before";

/// Fields matched exactly by [`build_query_filter`]
const EXACT_FIELDS: &[&str] = &["uuid", "title", "type"];

/// Build a filter from flat request parameters.
///
/// `uuid`, `title` and `type` match exactly, `title_contains` matches
/// `title` by substring (and wins over an exact `title`), and
/// `created_after` / `created_before` bound `created_at`. Null and empty
/// values are ignored; other parameters are not part of the filter.
#[must_use]
pub fn build_query_filter(params: &Map<String, Value>) -> Map<String, Value> {
    let params = sanitize_data(params.clone());
    let mut filter = Map::new();

    for field in EXACT_FIELDS {
        if let Some(value) = params.get(*field) {
            filter.insert((*field).to_string(), value.clone());
        }
    }

    if let Some(needle) = params.get("title_contains") {
        apply_contains(&mut filter, "title", needle);
    }
    for bound in [CREATED_AFTER, CREATED_BEFORE] {
        if let Some(value) = params.get(bound) {
            apply_created_bound(&mut filter, bound, value);
        }
    }

    filter
}

/// Rewrite shorthand keys of a `conditions` object into store operators.
///
/// Keys that are not shorthand pass through unchanged, in their original
/// order, so native operator documents keep working.
#[must_use]
pub fn normalize_conditions(conditions: Map<String, Value>) -> Map<String, Value> {
    let mut filter = Map::new();

    for (key, value) in conditions {
        if key == CREATED_AFTER || key == CREATED_BEFORE {
            apply_created_bound(&mut filter, &key, &value);
            continue;
        }
        match key.strip_suffix(CONTAINS_SUFFIX) {
            Some(field) if !field.is_empty() && value.is_string() => {
                apply_contains(&mut filter, field, &value);
            }
            _ => {
                filter.insert(key, value);
            }
        }
    }

    filter
}

/// Regex clause matching `needle` as a literal, case-insensitive substring
fn contains_clause(needle: &str) -> Value {
    json!({"$regex": regex::escape(needle), "$options": "i"})
}

fn apply_contains(filter: &mut Map<String, Value>, field: &str, needle: &Value) {
    let needle = match needle {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    filter.insert(field.to_string(), contains_clause(&needle));
}

fn apply_created_bound(filter: &mut Map<String, Value>, bound: &str, value: &Value) {
    let Some(timestamp) = timestamp_value(value) else {
        warn!("Ignoring {} that is not a millisecond timestamp: {}", bound, value);
        return;
    };
    let operator = if bound == CREATED_AFTER { "$gte" } else { "$lte" };

    let range = filter
        .entry(CREATED_AT.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !range.is_object() {
        // An exact created_at match is replaced by the range
        *range = Value::Object(Map::new());
    }
    if let Value::Object(range) = range {
        range.insert(operator.to_string(), Value::from(timestamp));
    }
}

fn timestamp_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
