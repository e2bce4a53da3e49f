//! Persisted output record schema
//!
//! `OutputRecord` is the document written once per executed instance. The
//! SurrealDB backend stores it as [`DbOutputRow`], which differs only in the
//! datetime encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Stable identifier of a stored output record (UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a new random RecordId
    pub fn new() -> Self {
        RecordId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// Kind of output record.
///
/// Only `instance` records are written by the runner; `overall` is kept so
/// that stores containing aggregate documents can still be read and
/// filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Instance,
    Overall,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Instance => "instance",
            OutputType::Overall => "overall",
        }
    }
}

/// One persisted evaluation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub record_id: RecordId,
    pub output_type: OutputType,
    /// Evaluation type key (e.g. `contains_pattern`)
    pub module_name: String,
    /// Output kind name registered for the evaluation type
    pub class_name: String,
    pub name_model: String,
    pub provider: String,
    /// Score in [0, 100], two-decimal precision
    pub score: f64,
    pub execution_date: DateTime<Utc>,
    /// The instance that produced this output, as a JSON object
    #[serde(default)]
    pub evaluation_instance: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub prompt_tokens_total: u64,
    #[serde(default)]
    pub completion_tokens_total: u64,
    #[serde(default)]
    pub duration_sec_total: f64,
    /// Scoring diagnostic or judge reasoning trace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl OutputRecord {
    /// `evaluation_instance.name`, if present.
    pub fn instance_name(&self) -> Option<&str> {
        self.evaluation_instance.get("name").and_then(Value::as_str)
    }
}

/// SurrealDB row for `evaluation_outputs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbOutputRow {
    pub record_id: String,
    pub output_type: OutputType,
    pub module_name: String,
    pub class_name: String,
    pub name_model: String,
    pub provider: String,
    pub score: f64,
    #[serde(with = "surreal_datetime")]
    pub execution_date: DateTime<Utc>,
    #[serde(default)]
    pub evaluation_instance: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub prompt_tokens_total: u64,
    #[serde(default)]
    pub completion_tokens_total: u64,
    #[serde(default)]
    pub duration_sec_total: f64,
    #[serde(default)]
    pub diagnostic: Option<String>,
}

impl From<OutputRecord> for DbOutputRow {
    fn from(r: OutputRecord) -> Self {
        DbOutputRow {
            record_id: r.record_id.0,
            output_type: r.output_type,
            module_name: r.module_name,
            class_name: r.class_name,
            name_model: r.name_model,
            provider: r.provider,
            score: r.score,
            execution_date: r.execution_date,
            evaluation_instance: r.evaluation_instance,
            message: r.message,
            prompt_tokens_total: r.prompt_tokens_total,
            completion_tokens_total: r.completion_tokens_total,
            duration_sec_total: r.duration_sec_total,
            diagnostic: r.diagnostic,
        }
    }
}

impl From<DbOutputRow> for OutputRecord {
    fn from(row: DbOutputRow) -> Self {
        OutputRecord {
            record_id: RecordId(row.record_id),
            output_type: row.output_type,
            module_name: row.module_name,
            class_name: row.class_name,
            name_model: row.name_model,
            provider: row.provider,
            score: row.score,
            execution_date: row.execution_date,
            evaluation_instance: row.evaluation_instance,
            message: row.message,
            prompt_tokens_total: row.prompt_tokens_total,
            completion_tokens_total: row.completion_tokens_total,
            duration_sec_total: row.duration_sec_total,
            diagnostic: row.diagnostic,
        }
    }
}
