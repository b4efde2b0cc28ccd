//! Sort parameter parsing
//!
//! Two spellings are accepted for `sorts`:
//! - compact text: `"title:desc,created_at:asc"`
//! - JSON: `{"title": -1, "created_at": 1}` or `[["title", -1], ["created_at", "asc"]]`

use std::fmt;

use bson::Document;
use serde_json::Value;
use tracing::warn;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// MongoDB's numeric form
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    /// Any positive number is ascending, any negative one descending
    #[must_use]
    pub fn from_number(n: i64) -> Option<Self> {
        match n.signum() {
            1 => Some(SortDirection::Ascending),
            -1 => Some(SortDirection::Descending),
            _ => None,
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(SortDirection::Ascending),
            "desc" | "descending" | "-1" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::from_number(i),
                None => n.as_f64().and_then(|f| {
                    if f > 0.0 {
                        Some(SortDirection::Ascending)
                    } else if f < 0.0 {
                        Some(SortDirection::Descending)
                    } else {
                        None
                    }
                }),
            },
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "asc"),
            SortDirection::Descending => write!(f, "desc"),
        }
    }
}

/// Ordered (field, direction) pairs
pub type SortCriteria = Vec<(String, SortDirection)>;

/// Parse the compact `field:dir,field2:dir2` form.
///
/// A field without a direction sorts descending; a direction other than
/// `desc`/`descending`/`-1` sorts ascending. Blank input, or input with no
/// usable field, yields a single descending sort on `default_field`.
#[must_use]
pub fn build_sort_criteria(sort_param: &str, default_field: &str) -> SortCriteria {
    let criteria: SortCriteria = sort_param
        .split(',')
        .filter_map(|item| {
            let (field, order) = match item.split_once(':') {
                Some((field, order)) => (
                    field.trim(),
                    SortDirection::parse(order)
                        .filter(|d| *d == SortDirection::Descending)
                        .unwrap_or(SortDirection::Ascending),
                ),
                None => (item.trim(), SortDirection::Descending),
            };
            (!field.is_empty()).then(|| (field.to_string(), order))
        })
        .collect();

    if criteria.is_empty() {
        vec![(default_field.to_string(), SortDirection::Descending)]
    } else {
        criteria
    }
}

/// Parse the `sorts` request parameter, falling back to `default` when it is
/// absent or malformed
#[must_use]
pub fn parse_sorts(sorts: Option<&str>, default: (&str, SortDirection)) -> SortCriteria {
    let fallback = || vec![(default.0.to_string(), default.1)];

    let Some(text) = sorts.map(str::trim).filter(|t| !t.is_empty()) else {
        return fallback();
    };

    if !(text.starts_with('{') || text.starts_with('[')) {
        return build_sort_criteria(text, default.0);
    }

    let parsed = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| criteria_from_json(&value));

    match parsed {
        Some(criteria) if !criteria.is_empty() => criteria,
        _ => {
            warn!("Sort condition parse failed, using default: {}", text);
            fallback()
        }
    }
}

fn criteria_from_json(value: &Value) -> Option<SortCriteria> {
    match value {
        Value::Object(fields) => fields
            .iter()
            .map(|(field, dir)| Some((field.clone(), SortDirection::from_json(dir)?)))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => {
                    let field = pair[0].as_str().filter(|f| !f.is_empty())?;
                    Some((field.to_string(), SortDirection::from_json(&pair[1])?))
                }
                Value::String(field) if !field.is_empty() => {
                    Some((field.clone(), SortDirection::Ascending))
                }
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Render criteria as a sort document
#[must_use]
pub fn to_sort_document(criteria: &[(String, SortDirection)]) -> Document {
    criteria
        .iter()
        .map(|(field, direction)| (field.clone(), bson::Bson::Int32(direction.as_i32())))
        .collect()
}
