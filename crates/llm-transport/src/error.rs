//! Error types for llm-transport

use thiserror::Error;

/// Errors that can occur while talking to a completion endpoint or
/// fetching a dataset.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Required credential or endpoint variable is not set
    #[error("Missing credentials: {0} not set")]
    MissingCredentials(String),

    /// HTTP request could not be sent or the connection failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Scripted fake ran out of queued responses
    #[error("No scripted response left for model {0}")]
    Exhausted(String),

    /// Dataset file could not be decoded
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// IO error (dataset cache)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for TransportError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        TransportError::Dataset(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for TransportError {
    fn from(err: arrow::error::ArrowError) -> Self {
        TransportError::Dataset(err.to_string())
    }
}
