//! Error types for docbridge
//!
//! Every failure a request can hit maps onto one variant here, and every
//! variant knows the HTTP status it is reported with.

use thiserror::Error;

/// Result type alias using docbridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docbridge
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or illegal routing parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// Content that parses as JSON but has no document representation, such as
    /// an integer beyond the signed 64-bit range
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// Any failure reported by the document store client
    #[error("Store error: {0}")]
    Store(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code for each error type
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::MalformedContent(_) => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Store(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code, attached to request failure logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::MalformedContent(_) => "malformed_content",
            Self::Store(_) => "store_error",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to send to a client.
    ///
    /// Client-caused errors echo their detail; server-side failures collapse
    /// to a generic text so driver and IO details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::MalformedContent(msg) => msg.clone(),
            Self::NotFound => "resource not found".to_string(),
            Self::MethodNotAllowed => "method not allowed".to_string(),
            Self::Store(_) => "database operation failed".to_string(),
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => {
                "internal server error".to_string()
            }
        }
    }

    /// Whether the error was caused by the server rather than the request
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
