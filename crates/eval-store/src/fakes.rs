//! In-memory fake for the storage trait (testing only)
//!
//! Provides `MemoryResultStore` that satisfies the `ResultStore` contract
//! without any external dependencies.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::{OutputRecord, RecordId};
use crate::storage_traits::*;

/// In-memory result store backed by a `Vec`.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: Mutex<Vec<OutputRecord>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`.
    pub fn with_records(records: Vec<OutputRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn insert(&self, record: OutputRecord) -> StorageResult<RecordId> {
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.record_id == record.record_id) {
            return Err(StoreError::DuplicateRecord {
                record_id: record.record_id.0,
            });
        }
        let id = record.record_id.clone();
        records.push(record);
        Ok(id)
    }

    async fn all(&self) -> StorageResult<Vec<OutputRecord>> {
        self.query(&OutputQuery::new()).await
    }

    async fn query(&self, query: &OutputQuery) -> StorageResult<Vec<OutputRecord>> {
        let records = self.records.lock().unwrap();
        let mut matched: Vec<_> = records.iter().filter(|r| query.matches(r)).cloned().collect();
        matched.sort_by_key(|r| r.execution_date);
        Ok(matched)
    }

    async fn remove(&self, record_id: &RecordId) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let idx = records
            .iter()
            .position(|r| &r.record_id == record_id)
            .ok_or_else(|| StoreError::NotFound {
                record_id: record_id.0.clone(),
            })?;
        records.remove(idx);
        Ok(())
    }
}
