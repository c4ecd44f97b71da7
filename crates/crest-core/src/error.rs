//! Error types for collaborator backends.

use thiserror::Error;

/// Errors from pool scaling backends.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("api rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Errors from metric query backends.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("query rejected ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("query returned no data: {0}")]
    NoData(String),

    #[error("malformed response: {0}")]
    Decode(String),
}
