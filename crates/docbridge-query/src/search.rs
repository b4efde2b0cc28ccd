//! Search path: turns query-string parameters into a find plan

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use docbridge_common::config::QueryConfig;
use docbridge_common::Result;
use docbridge_store::Namespace;

use crate::filter::normalize_conditions;
use crate::naming::{require, validate_collection_name, validate_database_name};
use crate::params::{safe_int_convert, safe_json_loads};
use crate::sort::{parse_sorts, SortCriteria, SortDirection};
use crate::write::key_field;

/// Query string of `GET /api/search`.
///
/// Every parameter arrives as text and is parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub db_name: Option<String>,
    pub collection_name: Option<String>,
    pub uuid_name: Option<String>,
    pub uuid: Option<String>,
    /// JSON object of field conditions
    pub conditions: Option<String>,
    /// JSON sort object or `field:dir,field2:dir2`
    pub sorts: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// A find, ready for the store
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub namespace: Namespace,
    pub filter: Map<String, Value>,
    pub sort: SortCriteria,
    pub skip: u64,
    pub limit: i64,
}

/// Build the find for a search request.
///
/// Returns `Ok(None)` when the request carries neither a key nor any
/// condition; such a search matches nothing and never reaches the store.
pub fn plan_search(params: &SearchParams, config: &QueryConfig) -> Result<Option<SearchPlan>> {
    let database = require(params.db_name.as_deref(), "db_name")?;
    let collection = require(params.collection_name.as_deref(), "collection_name")?;
    validate_database_name(database)?;
    validate_collection_name(collection)?;

    let mut filter = Map::new();
    if let Some(uuid) = params.uuid.as_deref().filter(|u| !u.is_empty()) {
        let field = key_field(params.uuid_name.as_deref())?;
        filter.insert(field, Value::String(uuid.to_string()));
    }

    // Conditions merge last and may replace the key clause
    match safe_json_loads(params.conditions.as_deref(), json!({})) {
        Value::Object(conditions) => filter.extend(normalize_conditions(conditions)),
        other => warn!("Ignoring conditions that are not a JSON object: {}", other),
    }

    if filter.is_empty() {
        debug!("Search on {}.{} has an empty filter", database, collection);
        return Ok(None);
    }

    let default_direction = if config.default_sort_direction < 0 {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    let sort = parse_sorts(
        params.sorts.as_deref(),
        (config.default_sort_field.as_str(), default_direction),
    );

    Ok(Some(SearchPlan {
        namespace: Namespace::new(database, collection),
        filter,
        sort,
        skip: resolve_skip(params.skip.as_deref(), config),
        limit: resolve_limit(params.limit.as_deref(), config),
    }))
}

/// Non-positive or unparsable limits fall back to the default; large ones are capped
fn resolve_limit(limit: Option<&str>, config: &QueryConfig) -> i64 {
    let default = i64::try_from(config.default_limit).unwrap_or(i64::MAX);
    let max = i64::try_from(config.max_limit).unwrap_or(i64::MAX);

    match safe_int_convert(limit, default) {
        n if n <= 0 => default.min(max),
        n => n.min(max),
    }
}

fn resolve_skip(skip: Option<&str>, config: &QueryConfig) -> u64 {
    let default = i64::try_from(config.default_skip).unwrap_or(0);
    u64::try_from(safe_int_convert(skip, default)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_common::Error;

    fn params() -> SearchParams {
        SearchParams {
            db_name: Some("app".to_string()),
            collection_name: Some("notes".to_string()),
            ..SearchParams::default()
        }
    }

    fn plan(params: &SearchParams) -> SearchPlan {
        plan_search(params, &QueryConfig::default()).unwrap().unwrap()
    }

    #[test]
    fn test_key_clause_and_defaults() {
        let plan = plan(&SearchParams {
            uuid: Some("n-1".to_string()),
            ..params()
        });
        assert_eq!(plan.namespace, Namespace::new("app", "notes"));
        assert_eq!(Value::Object(plan.filter), json!({"uuid": "n-1"}));
        assert_eq!(plan.sort, vec![("created_at".to_string(), SortDirection::Descending)]);
        assert_eq!(plan.limit, 5);
        assert_eq!(plan.skip, 0);
    }

    #[test]
    fn test_custom_key_field() {
        let plan = plan(&SearchParams {
            uuid_name: Some("slug".to_string()),
            uuid: Some("hello".to_string()),
            ..params()
        });
        assert_eq!(Value::Object(plan.filter), json!({"slug": "hello"}));
    }

    #[test]
    fn test_conditions_merge_last() {
        let plan = plan(&SearchParams {
            uuid: Some("n-1".to_string()),
            conditions: Some(r#"{"uuid": "n-2", "title_contains": "Foo"}"#.to_string()),
            ..params()
        });
        assert_eq!(
            Value::Object(plan.filter),
            json!({"uuid": "n-2", "title": {"$regex": "Foo", "$options": "i"}})
        );
    }

    #[test]
    fn test_empty_filter_short_circuits() {
        assert!(plan_search(&params(), &QueryConfig::default()).unwrap().is_none());

        let malformed = SearchParams {
            conditions: Some("{broken".to_string()),
            ..params()
        };
        assert!(plan_search(&malformed, &QueryConfig::default()).unwrap().is_none());

        let not_an_object = SearchParams {
            conditions: Some("[1, 2]".to_string()),
            ..params()
        };
        assert!(plan_search(&not_an_object, &QueryConfig::default()).unwrap().is_none());

        let empty_object = SearchParams {
            conditions: Some("{}".to_string()),
            ..params()
        };
        assert!(plan_search(&empty_object, &QueryConfig::default()).unwrap().is_none());

        let blank_key = SearchParams {
            uuid: Some(String::new()),
            conditions: Some("{}".to_string()),
            ..params()
        };
        assert!(plan_search(&blank_key, &QueryConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_lenient_limit_and_skip() {
        let cases = [
            (Some("20"), Some("3"), 20, 3),
            (Some("abc"), Some("x"), 5, 0),
            (Some("0"), Some("-4"), 5, 0),
            (Some("-1"), None, 5, 0),
            (Some("5000"), Some("10"), 1000, 10),
        ];
        for (limit, skip, want_limit, want_skip) in cases {
            let plan = plan(&SearchParams {
                uuid: Some("n-1".to_string()),
                limit: limit.map(str::to_string),
                skip: skip.map(str::to_string),
                ..params()
            });
            assert_eq!(plan.limit, want_limit, "limit {limit:?}");
            assert_eq!(plan.skip, want_skip, "skip {skip:?}");
        }
    }

    #[test]
    fn test_sorts() {
        let plan = plan(&SearchParams {
            uuid: Some("n-1".to_string()),
            sorts: Some(r#"{"title": 1}"#.to_string()),
            ..params()
        });
        assert_eq!(plan.sort, vec![("title".to_string(), SortDirection::Ascending)]);
    }

    #[test]
    fn test_configured_defaults() {
        let config = QueryConfig {
            default_limit: 50,
            default_skip: 2,
            max_limit: 100,
            default_sort_field: "updated_at".to_string(),
            default_sort_direction: 1,
        };
        let plan = plan_search(
            &SearchParams {
                uuid: Some("n-1".to_string()),
                ..params()
            },
            &config,
        )
        .unwrap()
        .unwrap();
        assert_eq!(plan.limit, 50);
        assert_eq!(plan.skip, 2);
        assert_eq!(plan.sort, vec![("updated_at".to_string(), SortDirection::Ascending)]);
    }

    #[test]
    fn test_missing_routing_params() {
        let missing = SearchParams {
            collection_name: None,
            ..params()
        };
        let err = plan_search(&missing, &QueryConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.status_code(), 400);
    }
}
