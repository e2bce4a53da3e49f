//! SurrealDB schema initialization
//!
//! Defines the `evaluation_outputs` table with its indexes. Safe to call on
//! every connection (idempotent).

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::Result;

/// Table holding every persisted output record.
pub const OUTPUTS_TABLE: &str = "evaluation_outputs";

/// Initialize all EvalAI tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing EvalAI SurrealDB schema");
    init_outputs_table(db).await?;
    info!("EvalAI schema initialization complete");
    Ok(())
}

/// Initialize `evaluation_outputs` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE evaluation_outputs {
///   record_id:               STRING (unique)
///   output_type:             STRING (enum: instance | overall)
///   module_name:             STRING (evaluation type key, indexed)
///   class_name:              STRING
///   name_model:              STRING (indexed)
///   provider:                STRING (indexed)
///   score:                   FLOAT
///   execution_date:          DATETIME (indexed)
///   evaluation_instance:     OBJECT
///   message:                 STRING
///   prompt_tokens_total:     INT
///   completion_tokens_total: INT
///   duration_sec_total:      FLOAT
///   diagnostic:              STRING?
/// }
/// ```
///
/// Records are append-only: updates are refused, deletes are allowed so a
/// bad result can be removed by id.
async fn init_outputs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing evaluation_outputs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS evaluation_outputs AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete FULL;

        DEFINE INDEX IF NOT EXISTS idx_record_id ON TABLE evaluation_outputs COLUMNS record_id UNIQUE;

        -- Skip-set scans and per-model queries
        DEFINE INDEX IF NOT EXISTS idx_execution_identity ON TABLE evaluation_outputs COLUMNS module_name, name_model, provider;

        DEFINE INDEX IF NOT EXISTS idx_output_type ON TABLE evaluation_outputs COLUMNS output_type;

        DEFINE INDEX IF NOT EXISTS idx_execution_date ON TABLE evaluation_outputs COLUMNS execution_date;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StoreError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;
    debug!("evaluation_outputs table initialized");
    Ok(())
}
