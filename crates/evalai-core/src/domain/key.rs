//! Composite identity of one unit of work.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(evaluation_type, model, provider, instance_name)`.
///
/// At most one output record per key is expected under normal operation;
/// the skip set compares these keys for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionKey {
    pub evaluation_type: String,
    pub model: String,
    pub provider: String,
    pub instance_name: String,
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}/{}",
            self.evaluation_type, self.provider, self.model, self.instance_name
        )
    }
}
