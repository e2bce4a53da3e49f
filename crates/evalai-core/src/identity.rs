//! Run identity and the skip set.
//!
//! A unit of work is identified by its [`ExecutionKey`]. Before a run the
//! keys of every stored instance-level record are collected; candidates whose
//! key is in that set are skipped. This is the only de-duplication there is.

use std::collections::HashSet;

use eval_store::{OutputQuery, OutputRecord, OutputType, ResultStore};

use crate::domain::{ExecutionKey, Result};

pub fn compute_key(
    evaluation_type: &str,
    model: &str,
    provider: &str,
    instance_name: &str,
) -> ExecutionKey {
    ExecutionKey {
        evaluation_type: evaluation_type.to_string(),
        model: model.to_string(),
        provider: provider.to_string(),
        instance_name: instance_name.to_string(),
    }
}

/// Key of a stored record. `None` for aggregate records and records whose
/// instance document has no name.
pub fn key_of_record(record: &OutputRecord) -> Option<ExecutionKey> {
    if record.output_type != OutputType::Instance {
        return None;
    }
    let name = record.instance_name()?;
    Some(compute_key(
        &record.module_name,
        &record.name_model,
        &record.provider,
        name,
    ))
}

/// Keys of every completed instance-level record in `store`.
pub async fn load_completed_keys(store: &dyn ResultStore) -> Result<HashSet<ExecutionKey>> {
    let records = store.query(&OutputQuery::instances()).await?;
    Ok(records.iter().filter_map(key_of_record).collect())
}

/// Items whose key is not in `completed`, order preserved.
pub fn filter_pending<T, F>(items: Vec<T>, completed: &HashSet<ExecutionKey>, key_of: F) -> Vec<T>
where
    F: Fn(&T) -> ExecutionKey,
{
    items
        .into_iter()
        .filter(|item| !completed.contains(&key_of(item)))
        .collect()
}
