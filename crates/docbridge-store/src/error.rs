//! Store gateway errors

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures reported by a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Unsupported store URI: {0}")]
    UnsupportedUri(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for docbridge_common::Error {
    fn from(e: StoreError) -> Self {
        docbridge_common::Error::Store(e.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
