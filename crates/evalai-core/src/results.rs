//! Result store adapter.
//!
//! Thin layer over [`ResultStore`] shared by the runner (persist, skip set)
//! and reporting (queries, latest results, per-model averages).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use eval_store::{OutputQuery, OutputRecord, OutputType, RecordId, ResultStore};
use serde::Serialize;
use tracing::debug;

use crate::domain::{EvaluationOutput, ExecutionKey, Result};
use crate::identity::{key_of_record, load_completed_keys};

/// Average score of one provider/model over its latest results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAverage {
    pub provider: String,
    pub model: String,
    pub evaluations: usize,
    pub average: f64,
}

#[derive(Clone)]
pub struct ResultStoreAdapter {
    store: Arc<dyn ResultStore>,
}

impl ResultStoreAdapter {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Append one instance-level record.
    pub async fn persist(&self, output: EvaluationOutput) -> Result<RecordId> {
        let record = output.into_record();
        debug!(
            record_id = %record.record_id,
            module = %record.module_name,
            model = %record.name_model,
            "persisting output record"
        );
        Ok(self.store.insert(record).await?)
    }

    pub async fn completed_keys(&self) -> Result<HashSet<ExecutionKey>> {
        load_completed_keys(self.store.as_ref()).await
    }

    pub async fn all(&self) -> Result<Vec<OutputRecord>> {
        Ok(self.store.all().await?)
    }

    pub async fn query(&self, query: &OutputQuery) -> Result<Vec<OutputRecord>> {
        Ok(self.store.query(query).await?)
    }

    /// Most recent instance record per (evaluation type, instance, provider,
    /// model) among those matching `query`, ordered by that key.
    pub async fn latest_results(&self, query: &OutputQuery) -> Result<Vec<OutputRecord>> {
        let query = query.clone().with_output_type(OutputType::Instance);
        let mut latest: BTreeMap<ExecutionKey, OutputRecord> = BTreeMap::new();
        for record in self.store.query(&query).await? {
            let Some(key) = key_of_record(&record) else {
                continue;
            };
            match latest.get(&key) {
                Some(existing) if existing.execution_date >= record.execution_date => {}
                _ => {
                    latest.insert(key, record);
                }
            }
        }
        Ok(latest.into_values().collect())
    }

    pub async fn remove(&self, record_id: &str) -> Result<()> {
        Ok(self.store.remove(&RecordId(record_id.to_string())).await?)
    }
}

/// Per provider/model average score over `records`.
pub fn model_averages(records: &[OutputRecord]) -> Vec<ModelAverage> {
    let mut totals: BTreeMap<(&str, &str), (usize, f64)> = BTreeMap::new();
    for record in records {
        let entry = totals
            .entry((record.provider.as_str(), record.name_model.as_str()))
            .or_default();
        entry.0 += 1;
        entry.1 += record.score;
    }
    totals
        .into_iter()
        .map(|((provider, model), (count, sum))| ModelAverage {
            provider: provider.to_string(),
            model: model.to_string(),
            evaluations: count,
            average: crate::domain::normalize_score(sum / count as f64),
        })
        .collect()
}
