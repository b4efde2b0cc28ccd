//! In-process document store
//!
//! Keeps every namespace in a map behind a single lock, so an upsert is
//! atomic with respect to concurrent readers and writers. Used by the test
//! suites and for `memory://` connection strings.

pub mod matcher;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::{DocumentStore, FindQuery, Namespace, UpsertOutcome};

/// Connection string prefix selecting this backend
pub const SCHEME: &str = "memory://";

/// Simple in-memory document store
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Namespace, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in a namespace
    pub fn count(&self, namespace: &Namespace) -> usize {
        self.collections.read().get(namespace).map_or(0, Vec::len)
    }

    /// Raw records of a namespace, including `_id`
    pub fn dump(&self, namespace: &Namespace) -> Vec<Document> {
        self.collections.read().get(namespace).cloned().unwrap_or_default()
    }

    /// Insert records as-is, assigning `_id` where missing
    pub fn seed(&self, namespace: &Namespace, records: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.write();
        let rows = collections.entry(namespace.clone()).or_default();
        for mut record in records {
            if !record.contains_key("_id") {
                record = with_object_id(record);
            }
            rows.push(record);
        }
    }
}

fn with_object_id(record: Document) -> Document {
    let mut doc = Document::new();
    doc.insert("_id", ObjectId::new());
    doc.extend(record);
    doc
}

/// Apply `value` at a dotted path, creating intermediate documents
fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(StoreError::WriteFailed(format!(
                    "cannot create field '{}' in non-document '{}'",
                    rest, head
                ))),
            }
        }
    }
}

fn apply_set(doc: &mut Document, set: &Document) -> Result<()> {
    for (path, value) in set {
        if path == "_id" {
            return Err(StoreError::WriteFailed("field '_id' is immutable".to_string()));
        }
        set_path(doc, path, value.clone())?;
    }
    Ok(())
}

/// Equality fields of a key filter seed a newly inserted record.
///
/// Dotted fields nest the same way `$set` does, so the key matches again.
fn seed_from_key(key: &Document) -> Result<Document> {
    let mut record = with_object_id(Document::new());
    for (field, value) in key {
        let is_operator = field.starts_with('$')
            || matches!(value, Bson::Document(inner) if inner.keys().any(|k| k.starts_with('$')));
        if !is_operator {
            set_path(&mut record, field, value.clone())?;
        }
    }
    Ok(record)
}

fn project(doc: Document, projection: &Document) -> Document {
    let include_mode = projection
        .iter()
        .any(|(field, flag)| field != "_id" && is_truthy(flag));
    let keep_id = projection.get("_id").map_or(true, is_truthy);

    doc.into_iter()
        .filter(|(field, _)| {
            if field == "_id" {
                return keep_id;
            }
            match projection.get(field) {
                Some(flag) => is_truthy(flag),
                None => !include_mode,
            }
        })
        .collect()
}

fn is_truthy(flag: &Bson) -> bool {
    match flag {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        _ => true,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_by_key(
        &self,
        namespace: &Namespace,
        key: Document,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome> {
        let mut collections = self.collections.write();
        let rows = collections.entry(namespace.clone()).or_default();

        for row in rows.iter_mut() {
            if matcher::matches(row, &key)? {
                // A failed path leaves the stored row untouched
                let mut updated = row.clone();
                apply_set(&mut updated, &set)?;
                *row = updated;
                debug!("Updated record in {}", namespace);
                return Ok(UpsertOutcome { created_new: false });
            }
        }

        let mut record = seed_from_key(&key)?;
        apply_set(&mut record, &set)?;
        apply_set(&mut record, &set_on_insert)?;
        rows.push(record);
        debug!("Inserted record into {}", namespace);

        Ok(UpsertOutcome { created_new: true })
    }

    async fn find(&self, namespace: &Namespace, query: &FindQuery) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(rows) = collections.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for row in rows {
            if matcher::matches(row, &query.filter)? {
                hits.push(row.clone());
            }
        }
        drop(collections);

        if let Some(sort) = &query.sort {
            hits.sort_by(|a, b| matcher::compare_by_sort(a, b, sort));
        }

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit)
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or(usize::MAX);

        Ok(hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &query.projection {
                Some(projection) => project(doc, projection),
                None => doc,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn notes() -> Namespace {
        Namespace::new("app", "notes")
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = MemoryStore::new();

        let first = store
            .upsert_by_key(
                &notes(),
                doc! {"uuid": "n-1"},
                doc! {"title": "draft", "updated_at": 1_i64},
                doc! {"created_at": 1_i64},
            )
            .await
            .unwrap();
        assert!(first.created_new);

        let second = store
            .upsert_by_key(
                &notes(),
                doc! {"uuid": "n-1"},
                doc! {"title": "final", "updated_at": 2_i64},
                doc! {"created_at": 2_i64},
            )
            .await
            .unwrap();
        assert!(!second.created_new);

        let rows = store.dump(&notes());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.get_object_id("_id").is_ok());
        assert_eq!(row.get_str("uuid").unwrap(), "n-1");
        assert_eq!(row.get_str("title").unwrap(), "final");
        assert_eq!(row.get_i64("created_at").unwrap(), 1);
        assert_eq!(row.get_i64("updated_at").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_rejects_id_change() {
        let store = MemoryStore::new();
        let err = store
            .upsert_by_key(&notes(), doc! {"uuid": "n-1"}, doc! {"_id": 5_i32}, doc! {})
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_dotted_set_creates_nested_document() {
        let store = MemoryStore::new();
        store
            .upsert_by_key(&notes(), doc! {"uuid": "n-1"}, doc! {"meta.views": 3_i32}, doc! {})
            .await
            .unwrap();
        let row = &store.dump(&notes())[0];
        assert_eq!(row.get_document("meta").unwrap().get_i32("views").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_dotted_key_matches_on_resave() {
        let store = MemoryStore::new();
        for (title, want_new) in [("draft", true), ("final", false)] {
            let outcome = store
                .upsert_by_key(&notes(), doc! {"meta.id": "k1"}, doc! {"title": title}, doc! {})
                .await
                .unwrap();
            assert_eq!(outcome.created_new, want_new, "{title}");
        }

        let rows = store.dump(&notes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_document("meta").unwrap().get_str("id").unwrap(), "k1");
        assert!(!rows[0].contains_key("meta.id"));
        assert_eq!(rows[0].get_str("title").unwrap(), "final");

        let found = store
            .find(&notes(), &FindQuery::new(doc! {"meta.id": "k1"}))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_record_unchanged() {
        let store = MemoryStore::new();
        store.seed(&notes(), [doc! {"uuid": "n-1", "title": "old"}]);

        let err = store
            .upsert_by_key(
                &notes(),
                doc! {"uuid": "n-1"},
                doc! {"title": "new", "title.x": 1_i32},
                doc! {},
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));

        let rows = store.dump(&notes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("title").unwrap(), "old");
    }

    #[tokio::test]
    async fn test_find_sort_skip_limit_projection() {
        let store = MemoryStore::new();
        store.seed(
            &notes(),
            (1..=7_i64).map(|i| doc! {"uuid": format!("n-{i}"), "type": "note", "created_at": i}),
        );

        let query = FindQuery {
            filter: doc! {"type": "note"},
            projection: Some(doc! {"_id": 0_i32}),
            skip: 1,
            limit: 3,
            sort: Some(doc! {"created_at": -1_i32}),
        };
        let rows = store.find(&notes(), &query).await.unwrap();

        let created: Vec<i64> = rows.iter().map(|r| r.get_i64("created_at").unwrap()).collect();
        assert_eq!(created, vec![6, 5, 4]);
        assert!(rows.iter().all(|r| !r.contains_key("_id")));
    }

    #[tokio::test]
    async fn test_find_zero_limit_returns_everything() {
        let store = MemoryStore::new();
        store.seed(&notes(), (0..4_i32).map(|i| doc! {"n": i}));
        let rows = store
            .find(&notes(), &FindQuery::new(doc! {"n": {"$gte": 0_i32}}))
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[tokio::test]
    async fn test_find_unknown_namespace() {
        let store = MemoryStore::new();
        let rows = store
            .find(&Namespace::new("nope", "nothing"), &FindQuery::new(doc! {"a": 1_i32}))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_inclusion_projection() {
        let doc = doc! {"_id": 1_i32, "a": 1_i32, "b": 2_i32};
        assert_eq!(project(doc.clone(), &doc! {"a": 1_i32}), doc! {"_id": 1_i32, "a": 1_i32});
        assert_eq!(project(doc, &doc! {"a": 1_i32, "_id": 0_i32}), doc! {"a": 1_i32});
    }
}
