//! Storage trait definitions for EvalAI
//!
//! `ResultStore` is an append-only document store for output records:
//! insert and query, no transactions, no in-place updates. Every insert is
//! committed on its own, so records written before a crash stay valid.
//!
//! An in-memory fake is provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::{OutputRecord, OutputType, RecordId};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StoreError>;

/// Field filter for [`ResultStore::query`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputQuery {
    pub output_type: Option<OutputType>,
    pub module_name: Option<String>,
    pub name_model: Option<String>,
    pub provider: Option<String>,
}

impl OutputQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `instance` records.
    pub fn instances() -> Self {
        Self::new().with_output_type(OutputType::Instance)
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn with_module(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn with_model(mut self, name_model: impl Into<String>) -> Self {
        self.name_model = Some(name_model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Whether `record` satisfies every set field.
    pub fn matches(&self, record: &OutputRecord) -> bool {
        self.output_type.map_or(true, |t| record.output_type == t)
            && self
                .module_name
                .as_deref()
                .map_or(true, |m| record.module_name == m)
            && self
                .name_model
                .as_deref()
                .map_or(true, |m| record.name_model == m)
            && self
                .provider
                .as_deref()
                .map_or(true, |p| record.provider == p)
    }
}

/// Append-only store of evaluation output records.
///
/// Guarantees:
/// - `insert` never modifies an existing record; a duplicate `record_id`
///   fails with `StoreError::DuplicateRecord`.
/// - `all` and `query` return records ordered by `execution_date`, oldest
///   first.
/// - `remove` deletes exactly one record, `StoreError::NotFound` if absent.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a record, returning its id.
    async fn insert(&self, record: OutputRecord) -> StorageResult<RecordId>;

    /// Every stored record.
    async fn all(&self) -> StorageResult<Vec<OutputRecord>>;

    /// Records matching `query`.
    async fn query(&self, query: &OutputQuery) -> StorageResult<Vec<OutputRecord>>;

    /// Delete a single record by id.
    async fn remove(&self, record_id: &RecordId) -> StorageResult<()>;
}
