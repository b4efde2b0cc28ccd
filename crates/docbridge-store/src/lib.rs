//! docbridge Store Gateway
//!
//! A narrow, async interface over a document store. Each call is one round
//! trip with no retries; any failure is surfaced unchanged as a
//! [`StoreError`].
//!
//! Backends:
//! - **MongoDB** (`mongodb://`, `mongodb+srv://`): the official driver, one
//!   client (and its connection pool) shared by every request
//! - **Memory** (`memory://`): an in-process store for tests and local runs
//!
//! ```rust,ignore
//! use docbridge_store::{connect, FindQuery, Namespace};
//!
//! let store = connect(&config.store).await?;
//! let ns = Namespace::new("app", "notes");
//! store.upsert_by_key(&ns, doc! {"uuid": "n1"}, doc! {"title": "hi"}, doc! {}).await?;
//! let docs = store.find(&ns, &FindQuery::new(doc! {"uuid": "n1"})).await?;
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod error;
pub mod memory;
pub mod mongo;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use tracing::info;

use docbridge_common::config::StoreConfig;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A (database, collection) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Parameters of a find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    pub skip: u64,
    /// Zero means no limit
    pub limit: i64,
    pub sort: Option<Document>,
}

impl FindQuery {
    #[must_use]
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// No record matched the key, so one was inserted
    pub created_new: bool,
}

/// Document store gateway
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically update the record matching `key`, inserting it if absent.
    ///
    /// `set` is applied in both cases; `set_on_insert` only when inserting.
    async fn upsert_by_key(
        &self,
        namespace: &Namespace,
        key: Document,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome>;

    /// Return the records matching `query.filter`, sorted, then skipped and limited
    async fn find(&self, namespace: &Namespace, query: &FindQuery) -> Result<Vec<Document>>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Open the store selected by the connection string's scheme
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    let uri = config.uri.trim();

    if uri.starts_with(memory::SCHEME) {
        info!("Using in-memory document store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        let store = MongoStore::connect(config).await?;
        return Ok(Arc::new(store));
    }

    Err(StoreError::UnsupportedUri(redact_uri(uri)))
}

/// Strip credentials from a connection string before it is logged
#[must_use]
pub fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
