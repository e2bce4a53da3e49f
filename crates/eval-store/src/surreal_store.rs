//! SurrealDB-backed ResultStore implementation
//!
//! Uses `schema::DbOutputRow` for persistence, converting to/from
//! `schema::OutputRecord` at the boundary.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::debug;

use crate::error::StoreError;
use crate::handle::{connect, StoreTarget};
use crate::migrations::{self, OUTPUTS_TABLE};
use crate::schema::{DbOutputRow, OutputRecord, RecordId};
use crate::storage_traits::{OutputQuery, ResultStore, StorageResult};

#[derive(Deserialize)]
struct RecordIdRow {
    #[allow(dead_code)]
    record_id: String,
}

/// SurrealDB-backed implementation of [`ResultStore`].
#[derive(Clone)]
pub struct SurrealResultStore {
    db: Surreal<Any>,
}

impl SurrealResultStore {
    /// Connect to `target` and run `init_schema`.
    pub async fn open(target: &StoreTarget) -> crate::Result<Self> {
        let db = connect(target).await?;
        migrations::init_schema(&db).await?;
        Ok(Self { db })
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::open(&StoreTarget::Memory).await
    }

    /// Create from environment variables (see [`StoreTarget::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::open(&StoreTarget::from_env()).await
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_rows(&self, query: &OutputQuery) -> StorageResult<Vec<DbOutputRow>> {
        let mut clauses = Vec::new();
        if query.output_type.is_some() {
            clauses.push("output_type = $output_type");
        }
        if query.module_name.is_some() {
            clauses.push("module_name = $module_name");
        }
        if query.name_model.is_some() {
            clauses.push("name_model = $name_model");
        }
        if query.provider.is_some() {
            clauses.push("provider = $provider");
        }

        let mut sql = format!("SELECT * FROM {}", OUTPUTS_TABLE);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY execution_date ASC");

        let mut request = self.db.query(sql);
        if let Some(output_type) = query.output_type {
            request = request.bind(("output_type", output_type.as_str().to_string()));
        }
        if let Some(module_name) = &query.module_name {
            request = request.bind(("module_name", module_name.clone()));
        }
        if let Some(name_model) = &query.name_model {
            request = request.bind(("name_model", name_model.clone()));
        }
        if let Some(provider) = &query.provider {
            request = request.bind(("provider", provider.clone()));
        }

        let mut res = request
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        res.take(0).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn exists(&self, record_id: &RecordId) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("SELECT record_id FROM type::table($table) WHERE record_id = $rid")
            .bind(("table", OUTPUTS_TABLE))
            .bind(("rid", record_id.0.clone()))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows: Vec<RecordIdRow> = res
            .take(0)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl ResultStore for SurrealResultStore {
    async fn insert(&self, record: OutputRecord) -> StorageResult<RecordId> {
        let record_id = record.record_id.clone();
        if self.exists(&record_id).await? {
            return Err(StoreError::DuplicateRecord {
                record_id: record_id.0,
            });
        }

        debug!(record_id = %record_id, module = %record.module_name, "inserting output record");

        let _created: Option<DbOutputRow> = self
            .db
            .create(OUTPUTS_TABLE)
            .content(DbOutputRow::from(record))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(record_id)
    }

    async fn all(&self) -> StorageResult<Vec<OutputRecord>> {
        self.query(&OutputQuery::new()).await
    }

    async fn query(&self, query: &OutputQuery) -> StorageResult<Vec<OutputRecord>> {
        let rows = self.fetch_rows(query).await?;
        Ok(rows.into_iter().map(OutputRecord::from).collect())
    }

    async fn remove(&self, record_id: &RecordId) -> StorageResult<()> {
        if !self.exists(record_id).await? {
            return Err(StoreError::NotFound {
                record_id: record_id.0.clone(),
            });
        }

        self.db
            .query("DELETE type::table($table) WHERE record_id = $rid")
            .bind(("table", OUTPUTS_TABLE))
            .bind(("rid", record_id.0.clone()))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(record_id = %record_id, "removed output record");
        Ok(())
    }
}
