//! MongoDB backend

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection};
use tracing::{debug, info};

use docbridge_common::config::StoreConfig;

use crate::error::{Result, StoreError};
use crate::{redact_uri, DocumentStore, FindQuery, Namespace, UpsertOutcome};

/// Gateway over a MongoDB deployment.
///
/// Holds a single driver client; the driver pools connections internally and
/// the client is cheap to share across requests.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Build a client from the connection string.
    ///
    /// The driver connects lazily, so this does not fail when the server is
    /// down; call [`DocumentStore::ping`] to check reachability.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| convert_mongodb_error(e, Operation::Connect))?;

        options.app_name = Some(config.app_name.clone());
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));
        // A startup ping against a dead server fails after the same bound
        if options.server_selection_timeout.is_none() {
            options.server_selection_timeout = Some(Duration::from_millis(config.connect_timeout_ms));
        }

        let client = Client::with_options(options)
            .map_err(|e| convert_mongodb_error(e, Operation::Connect))?;

        info!("MongoDB client configured for {}", redact_uri(&config.uri));
        Ok(Self { client })
    }

    fn collection(&self, namespace: &Namespace) -> Collection<Document> {
        self.client
            .database(&namespace.database)
            .collection::<Document>(&namespace.collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn upsert_by_key(
        &self,
        namespace: &Namespace,
        key: Document,
        set: Document,
        set_on_insert: Document,
    ) -> Result<UpsertOutcome> {
        let mut update = doc! { "$set": set };
        if !set_on_insert.is_empty() {
            update.insert("$setOnInsert", set_on_insert);
        }

        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .collection(namespace)
            .update_one(key, update, options)
            .await
            .map_err(|e| convert_mongodb_error(e, Operation::Write))?;

        debug!(
            "Upsert on {}: matched={}, modified={}, upserted={}",
            namespace,
            result.matched_count,
            result.modified_count,
            result.upserted_id.is_some()
        );

        Ok(UpsertOutcome {
            created_new: result.upserted_id.is_some(),
        })
    }

    async fn find(&self, namespace: &Namespace, query: &FindQuery) -> Result<Vec<Document>> {
        let options = FindOptions::builder()
            .projection(query.projection.clone())
            .skip((query.skip > 0).then_some(query.skip))
            .limit((query.limit > 0).then_some(query.limit))
            .sort(query.sort.clone())
            .build();

        let cursor = self
            .collection(namespace)
            .find(query.filter.clone(), options)
            .await
            .map_err(|e| convert_mongodb_error(e, Operation::Read))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| convert_mongodb_error(e, Operation::Read))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|e| convert_mongodb_error(e, Operation::Connect))
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Connect,
    Read,
    Write,
}

/// MongoDB specific error conversion
fn convert_mongodb_error(err: mongodb::error::Error, operation: Operation) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Authentication { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Io(_) => StoreError::ConnectionFailed(err.to_string()),
        ErrorKind::InvalidArgument { .. } => StoreError::InvalidQuery(err.to_string()),
        ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
            StoreError::Serialization(err.to_string())
        }
        _ => match operation {
            Operation::Connect => StoreError::ConnectionFailed(err.to_string()),
            Operation::Read => StoreError::ReadFailed(err.to_string()),
            Operation::Write => StoreError::WriteFailed(err.to_string()),
        },
    }
}
