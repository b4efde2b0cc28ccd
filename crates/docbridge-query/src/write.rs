//! Write path: turns a save request into an upsert plan

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use docbridge_common::{Error, Result};
use docbridge_store::Namespace;

use crate::naming::{require, validate_collection_name, validate_database_name, validate_key_field};
use crate::params::{generate_uuid, safe_json_loads};
use crate::{CREATED_AT, DEFAULT_KEY_FIELD, STORE_ID_FIELD, UPDATED_AT};

/// Field an array `content` is wrapped under
pub const LIST_FIELD: &str = "list";

/// Body of `POST /api/save`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    pub db_name: Option<String>,
    pub collection_name: Option<String>,
    /// Name of the key field, `uuid` when absent
    pub uuid_name: Option<String>,
    /// Key value, generated when absent
    pub uuid: Option<Value>,
    /// JSON text of an object or array; an inline object or array is also accepted
    pub content: Option<Value>,
}

/// A single keyed upsert
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub namespace: Namespace,
    pub key_field: String,
    pub key_value: Value,
    /// Fields written on insert and update
    pub set: Map<String, Value>,
    /// Fields written only when the upsert inserts
    pub set_on_insert: Map<String, Value>,
    pub timestamp: i64,
}

impl WritePlan {
    /// `{key_field: key_value}`
    #[must_use]
    pub fn key(&self) -> Map<String, Value> {
        let mut key = Map::new();
        key.insert(self.key_field.clone(), self.key_value.clone());
        key
    }
}

/// Build the upsert for a save request stamped with `now_ms`
pub fn plan_save(request: &SaveRequest, now_ms: i64) -> Result<WritePlan> {
    let database = require(request.db_name.as_deref(), "db_name")?;
    let collection = require(request.collection_name.as_deref(), "collection_name")?;
    validate_database_name(database)?;
    validate_collection_name(collection)?;

    let key_field = key_field(request.uuid_name.as_deref())?;
    let key_value = key_value(request.uuid.as_ref())?;

    let mut set = writable_fields(parse_content(request.content.as_ref()), &key_field);
    set.insert(UPDATED_AT.to_string(), Value::from(now_ms));

    let mut set_on_insert = Map::new();
    set_on_insert.insert(CREATED_AT.to_string(), Value::from(now_ms));

    Ok(WritePlan {
        namespace: Namespace::new(database, collection),
        key_field,
        key_value,
        set,
        set_on_insert,
        timestamp: now_ms,
    })
}

/// Resolve the key field name; blank means the default
pub(crate) fn key_field(uuid_name: Option<&str>) -> Result<String> {
    let name = uuid_name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(DEFAULT_KEY_FIELD);
    validate_key_field(name)?;
    Ok(name.to_string())
}

/// Keys are always stored as strings, the form a search by key compares against
fn key_value(uuid: Option<&Value>) -> Result<Value> {
    match uuid {
        None | Some(Value::Null) => Ok(Value::String(generate_uuid())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Value::String(generate_uuid())),
        Some(Value::String(s)) => Ok(Value::String(s.clone())),
        Some(Value::Number(n)) => Ok(Value::String(n.to_string())),
        Some(_) => Err(Error::Validation("uuid must be a string or number".to_string())),
    }
}

/// Interpret `content` as a record body.
///
/// Never fails: unparsable text and scalars become an empty object, and an
/// array is wrapped as `{"list": [...]}`.
#[must_use]
pub fn parse_content(content: Option<&Value>) -> Map<String, Value> {
    let value = match content {
        None | Some(Value::Null) => return Map::new(),
        Some(Value::String(text)) => safe_json_loads(Some(text), json!({})),
        Some(other) => other.clone(),
    };

    match value {
        Value::Object(fields) => fields,
        Value::Array(items) => {
            let mut wrapped = Map::new();
            wrapped.insert(LIST_FIELD.to_string(), Value::Array(items));
            wrapped
        }
        other => {
            warn!("Content is not an object or array, storing empty content: {}", other);
            Map::new()
        }
    }
}

/// Remove fields a client may not write
fn writable_fields(content: Map<String, Value>, key_field: &str) -> Map<String, Value> {
    content
        .into_iter()
        .filter(|(field, _)| {
            if field.is_empty() || field.starts_with('$') {
                warn!("Dropping content field {:?}", field);
                return false;
            }
            !matches!(field.as_str(), STORE_ID_FIELD | CREATED_AT | UPDATED_AT) && field != key_field
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::validate_uuid;

    fn request(content: Option<Value>) -> SaveRequest {
        SaveRequest {
            db_name: Some("app".to_string()),
            collection_name: Some("notes".to_string()),
            content,
            ..SaveRequest::default()
        }
    }

    #[test]
    fn test_object_content() {
        let req = SaveRequest {
            uuid: Some(json!("n-1")),
            ..request(Some(json!(r#"{"title": "hello", "views": 3}"#)))
        };
        let plan = plan_save(&req, 1_000).unwrap();

        assert_eq!(plan.namespace, Namespace::new("app", "notes"));
        assert_eq!(Value::Object(plan.key()), json!({"uuid": "n-1"}));
        assert_eq!(
            Value::Object(plan.set),
            json!({"title": "hello", "views": 3, "updated_at": 1_000})
        );
        assert_eq!(Value::Object(plan.set_on_insert), json!({"created_at": 1_000}));
    }

    #[test]
    fn test_array_content_is_wrapped() {
        let plan = plan_save(&request(Some(json!(r#"[{"item":1},{"item":2}]"#))), 5).unwrap();
        assert_eq!(
            Value::Object(plan.set),
            json!({"list": [{"item": 1}, {"item": 2}], "updated_at": 5})
        );
    }

    #[test]
    fn test_malformed_content_becomes_empty() {
        for content in [json!("{not json"), json!("42"), json!(7), json!(true)] {
            let plan = plan_save(&request(Some(content)), 9).unwrap();
            assert_eq!(Value::Object(plan.set), json!({"updated_at": 9}));
        }
        let plan = plan_save(&request(None), 9).unwrap();
        assert_eq!(Value::Object(plan.set), json!({"updated_at": 9}));
    }

    #[test]
    fn test_inline_object_content() {
        let plan = plan_save(&request(Some(json!({"title": "inline"}))), 1).unwrap();
        assert_eq!(plan.set.get("title"), Some(&json!("inline")));
    }

    #[test]
    fn test_key_is_generated() {
        for uuid in [None, Some(Value::Null), Some(json!(""))] {
            let req = SaveRequest { uuid, ..request(None) };
            let plan = plan_save(&req, 1).unwrap();
            assert_eq!(plan.key_field, "uuid");
            assert!(validate_uuid(plan.key_value.as_str().unwrap()));
        }
    }

    #[test]
    fn test_custom_key_field() {
        let req = SaveRequest {
            uuid_name: Some("slug".to_string()),
            uuid: Some(json!(42)),
            ..request(Some(json!(r#"{"slug": "other", "title": "t"}"#)))
        };
        let plan = plan_save(&req, 1).unwrap();
        assert_eq!(Value::Object(plan.key()), json!({"slug": "42"}));
        assert!(!plan.set.contains_key("slug"));
    }

    #[test]
    fn test_reserved_fields_are_stripped() {
        let content = json!(
            r#"{"_id": 1, "uuid": "x", "created_at": 0, "updated_at": 0, "$set": {}, "": 1, "ok": 1}"#
        );
        let plan = plan_save(&request(Some(content)), 77).unwrap();
        assert_eq!(Value::Object(plan.set), json!({"ok": 1, "updated_at": 77}));
    }

    #[test]
    fn test_validation_errors() {
        let missing_db = SaveRequest { db_name: None, ..request(None) };
        assert!(matches!(plan_save(&missing_db, 1), Err(Error::Validation(_))));

        let blank_collection = SaveRequest {
            collection_name: Some(" ".to_string()),
            ..request(None)
        };
        assert!(matches!(plan_save(&blank_collection, 1), Err(Error::Validation(_))));

        let bad_key_field = SaveRequest {
            uuid_name: Some("$where".to_string()),
            ..request(None)
        };
        assert!(matches!(plan_save(&bad_key_field, 1), Err(Error::Validation(_))));

        let object_key = SaveRequest {
            uuid: Some(json!({"$ne": null})),
            ..request(None)
        };
        assert!(matches!(plan_save(&object_key, 1), Err(Error::Validation(_))));

        let bool_key = SaveRequest {
            uuid: Some(json!(true)),
            ..request(None)
        };
        assert!(matches!(plan_save(&bool_key, 1), Err(Error::Validation(_))));
    }
}
