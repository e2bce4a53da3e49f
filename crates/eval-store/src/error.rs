//! Error types for eval-store

use thiserror::Error;

/// Errors that can occur in the result persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Query or write rejected by the backend
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Record (de)serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// No record with this id
    #[error("Output record not found: {record_id}")]
    NotFound { record_id: String },

    /// A record with this id already exists
    #[error("Output record already exists: {record_id}")]
    DuplicateRecord { record_id: String },
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
