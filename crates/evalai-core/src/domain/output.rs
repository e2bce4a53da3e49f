//! The result of executing one instance against one model.

use chrono::{DateTime, Utc};
use eval_store::{OutputRecord, OutputType, RecordId};

use crate::domain::instance::EvaluationInstance;
use crate::domain::key::ExecutionKey;

/// Scored output of one execution. Created once, appended, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutput {
    pub evaluation_type: String,
    pub output_class: String,
    pub model: String,
    pub provider: String,
    /// In [0, 100], two-decimal precision
    pub score: f64,
    pub instance: EvaluationInstance,
    /// First generated message (the candidate answer)
    pub message: String,
    pub prompt_tokens_total: u64,
    pub completion_tokens_total: u64,
    pub duration_sec_total: f64,
    pub execution_date: DateTime<Utc>,
    pub diagnostic: Option<String>,
}

impl EvaluationOutput {
    pub fn key(&self) -> ExecutionKey {
        ExecutionKey {
            evaluation_type: self.evaluation_type.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            instance_name: self.instance.name.clone(),
        }
    }

    /// Instance-level store record with a fresh record id.
    pub fn into_record(self) -> OutputRecord {
        OutputRecord {
            record_id: RecordId::new(),
            output_type: OutputType::Instance,
            evaluation_instance: self.instance.to_document(),
            module_name: self.evaluation_type,
            class_name: self.output_class,
            name_model: self.model,
            provider: self.provider,
            score: self.score,
            execution_date: self.execution_date,
            message: self.message,
            prompt_tokens_total: self.prompt_tokens_total,
            completion_tokens_total: self.completion_tokens_total,
            duration_sec_total: self.duration_sec_total,
            diagnostic: self.diagnostic,
        }
    }
}

/// Clamp to [0, 100] and round to two decimals.
pub fn normalize_score(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    (score.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::{InstanceParams, PatternParams};

    #[test]
    fn test_normalize_score() {
        assert_eq!(normalize_score(33.333333), 33.33);
        assert_eq!(normalize_score(66.666666), 66.67);
        assert_eq!(normalize_score(120.0), 100.0);
        assert_eq!(normalize_score(-1.0), 0.0);
        assert_eq!(normalize_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_into_record_is_instance_level() {
        let output = EvaluationOutput {
            evaluation_type: "contains_pattern".to_string(),
            output_class: "ContainsPatternOutput".to_string(),
            model: "llama3.1:8b".to_string(),
            provider: "ollama".to_string(),
            score: 100.0,
            instance: EvaluationInstance::new(
                "simple_math",
                InstanceParams::Pattern(PatternParams {
                    prompt: "2+2?".to_string(),
                    pattern: "4".to_string(),
                    system_prompt: None,
                }),
            ),
            message: "4".to_string(),
            prompt_tokens_total: 9,
            completion_tokens_total: 1,
            duration_sec_total: 0.1,
            execution_date: Utc::now(),
            diagnostic: None,
        };
        let key = output.key();
        let record = output.into_record();
        assert_eq!(record.output_type, OutputType::Instance);
        assert_eq!(record.module_name, key.evaluation_type);
        assert_eq!(record.instance_name(), Some("simple_math"));
        assert_eq!(record.evaluation_instance["pattern"], "4");
    }
}
