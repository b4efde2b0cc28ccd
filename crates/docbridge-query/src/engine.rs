//! Query engine: runs translated requests against a document store

use std::sync::Arc;

use bson::Document;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use docbridge_common::config::QueryConfig;
use docbridge_common::{metrics, Error, Result};
use docbridge_store::convert::{document_to_json, json_object_to_document};
use docbridge_store::{DocumentStore, FindQuery, StoreError};

use crate::params::now_millis;
use crate::search::{plan_search, SearchParams};
use crate::sort::to_sort_document;
use crate::write::{plan_save, SaveRequest};
use crate::STORE_ID_FIELD;

/// Response body of a successful save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub message: String,
    /// `{key_field: key_value}` of the written record
    pub id: Map<String, Value>,
    pub is_new: bool,
}

/// Executes save and search requests.
///
/// Holds the one shared store handle; cloning is cheap.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Upsert one record by key
    pub async fn save(&self, request: &SaveRequest) -> Result<SaveOutcome> {
        let plan = plan_save(request, now_millis())?;

        let key = json_object_to_document(&plan.key()).map_err(unstorable)?;
        let set = json_object_to_document(&plan.set).map_err(unstorable)?;
        let set_on_insert = json_object_to_document(&plan.set_on_insert).map_err(unstorable)?;

        let outcome = self
            .store
            .upsert_by_key(&plan.namespace, key, set, set_on_insert)
            .await
            .map_err(store_failure("upsert"))?;

        metrics::record_save(outcome.created_new);
        info!(
            "Saved record {}={} in {} (new: {})",
            plan.key_field, plan.key_value, plan.namespace, outcome.created_new
        );

        Ok(SaveOutcome {
            message: "Data saved successfully".to_string(),
            id: plan.key(),
            is_new: outcome.created_new,
        })
    }

    /// Find records; an empty filter yields an empty result
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Value>> {
        let Some(plan) = plan_search(params, &self.config)? else {
            metrics::record_search_short_circuit();
            return Ok(Vec::new());
        };

        let query = FindQuery {
            filter: json_object_to_document(&plan.filter).map_err(unstorable)?,
            projection: Some(id_exclusion()),
            skip: plan.skip,
            limit: plan.limit,
            sort: Some(to_sort_document(&plan.sort)),
        };
        debug!("Find in {}: {:?}", plan.namespace, query);

        let records = self
            .store
            .find(&plan.namespace, &query)
            .await
            .map_err(store_failure("find"))?;

        metrics::record_search(records.len());
        Ok(records.into_iter().map(document_to_json).collect())
    }

    /// Check that the store answers
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.map_err(store_failure("ping"))
    }
}

fn id_exclusion() -> Document {
    let mut projection = Document::new();
    projection.insert(STORE_ID_FIELD, 0_i32);
    projection
}

/// Client input without a document form; never reaches the store
fn unstorable(e: StoreError) -> Error {
    warn!("Rejected request input: {}", e);
    Error::MalformedContent(format!("content cannot be stored: {e}"))
}

fn store_failure(operation: &'static str) -> impl Fn(StoreError) -> Error {
    move |e| {
        error!("Store {} failed: {}", operation, e);
        metrics::record_store_error(operation);
        Error::from(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbridge_store::{MemoryStore, Namespace, UpsertOutcome};
    use serde_json::json;

    fn engine() -> (QueryEngine, MemoryStore) {
        let store = MemoryStore::new();
        let engine = QueryEngine::new(Arc::new(store.clone()), QueryConfig::default());
        (engine, store)
    }

    fn save_request(uuid: &str, content: &str) -> SaveRequest {
        SaveRequest {
            db_name: Some("app".to_string()),
            collection_name: Some("notes".to_string()),
            uuid: Some(json!(uuid)),
            content: Some(json!(content)),
            ..SaveRequest::default()
        }
    }

    fn search_by(uuid: &str) -> SearchParams {
        SearchParams {
            db_name: Some("app".to_string()),
            collection_name: Some("notes".to_string()),
            uuid: Some(uuid.to_string()),
            ..SearchParams::default()
        }
    }

    #[tokio::test]
    async fn test_save_then_search() {
        let (engine, _) = engine();

        let outcome = engine
            .save(&save_request("n-1", r#"{"title": "hello", "tags": ["a"]}"#))
            .await
            .unwrap();
        assert!(outcome.is_new);
        assert_eq!(outcome.message, "Data saved successfully");
        assert_eq!(Value::Object(outcome.id), json!({"uuid": "n-1"}));

        let found = engine.search(&search_by("n-1")).await.unwrap();
        assert_eq!(found.len(), 1);
        let record = found[0].as_object().unwrap();
        assert_eq!(record["title"], json!("hello"));
        assert_eq!(record["tags"], json!(["a"]));
        assert_eq!(record["uuid"], json!("n-1"));
        assert!(record.contains_key("created_at"));
        assert!(record.contains_key("updated_at"));
        assert!(!record.contains_key("_id"));
    }

    #[tokio::test]
    async fn test_second_save_keeps_created_at() {
        let (engine, store) = engine();

        engine.save(&save_request("n-1", r#"{"v": 1}"#)).await.unwrap();
        let first = store.dump(&Namespace::new("app", "notes"))[0].clone();
        assert_eq!(first.get_i64("created_at").unwrap(), first.get_i64("updated_at").unwrap());

        let again = engine.save(&save_request("n-1", r#"{"v": 2}"#)).await.unwrap();
        assert!(!again.is_new);

        let rows = store.dump(&Namespace::new("app", "notes"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("created_at").unwrap(), first.get_i64("created_at").unwrap());
        assert!(rows[0].get_i64("updated_at").unwrap() >= first.get_i64("updated_at").unwrap());
        assert_eq!(rows[0].get_i64("v").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_filter_skips_store() {
        let (engine, store) = engine();
        engine.save(&save_request("n-1", "{}")).await.unwrap();

        let params = SearchParams {
            uuid: None,
            ..search_by("")
        };
        assert!(engine.search(&params).await.unwrap().is_empty());

        let match_all = SearchParams {
            conditions: Some("{}".to_string()),
            ..params
        };
        assert!(engine.search(&match_all).await.unwrap().is_empty());
        assert_eq!(store.count(&Namespace::new("app", "notes")), 1);
    }

    #[tokio::test]
    async fn test_search_sorted_and_limited() {
        let (engine, _) = engine();
        for (i, title) in ["b", "d", "a", "c"].iter().enumerate() {
            engine
                .save(&save_request(&format!("n-{i}"), &format!(r#"{{"title": "{title}", "kind": "note"}}"#)))
                .await
                .unwrap();
        }

        let params = SearchParams {
            uuid: None,
            conditions: Some(r#"{"kind": "note"}"#.to_string()),
            sorts: Some("title:asc".to_string()),
            limit: Some("2".to_string()),
            skip: Some("1".to_string()),
            ..search_by("")
        };
        let titles: Vec<Value> = engine
            .search(&params)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("b"), json!("c")]);
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn upsert_by_key(
            &self,
            _: &Namespace,
            _: Document,
            _: Document,
            _: Document,
        ) -> docbridge_store::Result<UpsertOutcome> {
            Err(StoreError::WriteFailed("disk full at 10.0.0.5".to_string()))
        }

        async fn find(&self, _: &Namespace, _: &FindQuery) -> docbridge_store::Result<Vec<Document>> {
            Err(StoreError::ReadFailed("socket closed".to_string()))
        }

        async fn ping(&self) -> docbridge_store::Result<()> {
            Err(StoreError::ConnectionFailed("no servers".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_store_errors_are_hidden_from_clients() {
        let engine = QueryEngine::new(Arc::new(FailingStore), QueryConfig::default());

        let err = engine.save(&save_request("n-1", "{}")).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.client_message(), "database operation failed");

        let err = engine.search(&search_by("n-1")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        let err = engine.ping().await.unwrap_err();
        assert!(err.to_string().contains("no servers"));
    }

    #[tokio::test]
    async fn test_dotted_key_field_resaves_in_place() {
        let (engine, store) = engine();
        let request = |content: &str| SaveRequest {
            uuid_name: Some("meta.id".to_string()),
            ..save_request("k1", content)
        };

        assert!(engine.save(&request(r#"{"v": 1}"#)).await.unwrap().is_new);
        assert!(!engine.save(&request(r#"{"v": 2}"#)).await.unwrap().is_new);
        assert_eq!(store.count(&Namespace::new("app", "notes")), 1);

        let params = SearchParams {
            uuid_name: Some("meta.id".to_string()),
            ..search_by("k1")
        };
        let found = engine.search(&params).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["meta"], json!({"id": "k1"}));
        assert_eq!(found[0]["v"], json!(2));
    }

    #[tokio::test]
    async fn test_numeric_key_is_searchable() {
        let (engine, _) = engine();
        let request = SaveRequest {
            uuid: Some(json!(42)),
            ..save_request("", r#"{"title": "answer"}"#)
        };
        let outcome = engine.save(&request).await.unwrap();
        assert_eq!(Value::Object(outcome.id), json!({"uuid": "42"}));

        let found = engine.search(&search_by("42")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], json!("answer"));
    }

    #[tokio::test]
    async fn test_unstorable_content_is_a_client_error() {
        let (engine, store) = engine();
        let err = engine
            .save(&save_request("n-1", r#"{"n": 18446744073709551615}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedContent(_)));
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.count(&Namespace::new("app", "notes")), 0);
    }

    #[tokio::test]
    async fn test_validation_reaches_caller() {
        let (engine, _) = engine();
        let request = SaveRequest {
            db_name: None,
            ..save_request("n-1", "{}")
        };
        let err = engine.save(&request).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
