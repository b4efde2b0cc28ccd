//! Query evaluation for the in-memory store
//!
//! Covers the subset of the MongoDB query language the search path produces:
//! equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex/$options`,
//! `$and $or $nor`, dotted field paths and array element matching.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use crate::error::{Result, StoreError};

/// Check whether `doc` satisfies `filter`
pub fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => logical_branches(doc, condition)?.iter().all(|b| *b),
            "$or" => logical_branches(doc, condition)?.iter().any(|b| *b),
            "$nor" => !logical_branches(doc, condition)?.iter().any(|b| *b),
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidQuery(format!("unknown top level operator: {}", op)))
            }
            path => matches_field(lookup(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical_branches(doc: &Document, condition: &Bson) -> Result<Vec<bool>> {
    let Bson::Array(branches) = condition else {
        return Err(StoreError::InvalidQuery("logical operator needs an array".to_string()));
    };
    branches
        .iter()
        .map(|branch| match branch {
            Bson::Document(filter) => matches(doc, filter),
            _ => Err(StoreError::InvalidQuery("logical operator entries must be documents".to_string())),
        })
        .collect()
}

/// Resolve a dotted path against a document
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(inner) if !inner.is_empty() && inner.keys().all(|k| k.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    if let Some(operators) = is_operator_document(condition) {
        for (op, operand) in operators {
            let ok = match op.as_str() {
                "$eq" => equals(value, operand),
                "$ne" => !equals(value, operand),
                "$gt" => compares(value, operand, |o| o == Ordering::Greater),
                "$gte" => compares(value, operand, |o| o != Ordering::Less),
                "$lt" => compares(value, operand, |o| o == Ordering::Less),
                "$lte" => compares(value, operand, |o| o != Ordering::Greater),
                "$in" => in_list(value, operand)?,
                "$nin" => !in_list(value, operand)?,
                "$exists" => value.is_some() == truthy(operand),
                "$regex" => {
                    let options = operators.get_str("$options").unwrap_or("");
                    let regex = compile_regex(operand, options)?;
                    matches_regex(value, &regex)
                }
                "$options" => true,
                other => {
                    return Err(StoreError::InvalidQuery(format!("unknown operator: {}", other)))
                }
            };
            if !ok {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Bson::RegularExpression(re) = condition {
        let regex = build_regex(&re.pattern, &re.options)?;
        return Ok(matches_regex(value, &regex));
    }

    Ok(equals(value, condition))
}

/// Equality with MongoDB's array semantics: a scalar condition matches an
/// array field if any element equals it; a missing field equals null.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(actual) => values_equal(actual, expected),
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| same_type_cmp(item, operand).map_or(false, &accept)),
        Some(actual) => same_type_cmp(actual, operand).map_or(false, accept),
        None => false,
    }
}

fn in_list(value: Option<&Bson>, operand: &Bson) -> Result<bool> {
    let Bson::Array(candidates) = operand else {
        return Err(StoreError::InvalidQuery("$in/$nin needs an array".to_string()));
    };
    Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

fn truthy(operand: &Bson) -> bool {
    match operand {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).map_or(true, |n| n != 0.0),
    }
}

fn compile_regex(pattern: &Bson, options: &str) -> Result<Regex> {
    match pattern {
        Bson::String(p) => build_regex(p, options),
        Bson::RegularExpression(re) => {
            let merged = format!("{}{}", re.options, options);
            build_regex(&re.pattern, &merged)
        }
        _ => Err(StoreError::InvalidQuery("$regex needs a string".to_string())),
    }
}

fn build_regex(pattern: &str, options: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|e| StoreError::InvalidQuery(format!("invalid regex: {}", e)))
}

fn matches_regex(value: Option<&Bson>, regex: &Regex) -> bool {
    match value {
        Some(Bson::String(s)) => regex.is_match(s),
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Bson::String(s) if regex.is_match(s))),
        _ => false,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x == y,
        (Bson::Int64(x), Bson::Int64(y)) => x == y,
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => i64::from(*x) == *y,
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Ordering between values of the same BSON type bracket; `None` otherwise
fn same_type_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    if type_rank(a) != type_rank(b) {
        return None;
    }
    Some(compare_values(a, b))
}

/// Position of a value's type in MongoDB's cross-type sort order
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Total order used for sorting, following MongoDB's type ordering
pub fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Array(x), Bson::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Bson::Document(x), Bson::Document(y)) => x
            .iter()
            .zip(y)
            .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare_values(lv, rv)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Compare two documents by a sort specification (`{field: 1 | -1, ...}`)
pub fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let descending = as_f64(direction).map_or(false, |d| d < 0.0);
        let left = lookup(a, field).unwrap_or(&Bson::Null);
        let right = lookup(b, field).unwrap_or(&Bson::Null);
        let ordering = compare_values(left, right);
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering.is_ne() {
            return ordering;
        }
    }
    Ordering::Equal
}
