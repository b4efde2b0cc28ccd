//! Conversion between JSON values and BSON documents

use bson::{Bson, Document};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Convert a JSON value to BSON.
///
/// Objects stay plain documents: operator keys such as `$regex` are kept
/// as-is rather than read as extended JSON.
pub fn json_to_bson(value: &Value) -> Result<Bson> {
    Ok(bson::to_bson(value)?)
}

/// Convert a JSON object to a BSON document
pub fn json_object_to_document(object: &Map<String, Value>) -> Result<Document> {
    match json_to_bson(&Value::Object(object.clone()))? {
        Bson::Document(doc) => Ok(doc),
        other => Err(StoreError::Serialization(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// Convert a BSON document to a JSON object.
///
/// Uses relaxed extended JSON, so integers and doubles come back as plain
/// numbers while dates and object ids keep their `$date`/`$oid` wrappers.
#[must_use]
pub fn document_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}
