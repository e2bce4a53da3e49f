//! Static evaluation registry.
//!
//! Maps an evaluation type key (the `run_config.evaluation_type` of a
//! definition file) to everything the runner needs for that type:
//! - how to parse an instance document into typed parameters
//! - how to map dataset rows to instance documents, for dataset-backed types
//! - how to construct the scorer
//!
//! New types are added by registering another [`EvaluationDefinition`].

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::domain::{EvalError, EvaluationInstance, InstanceParams, Result};
use crate::scorer::Scorer;
use crate::scorers::{
    InstructionFollowingScorer, JudgeHandle, MultipleChoiceScorer, PatternScorer, RubricScorer,
    SchemaScorer,
};

pub type InstanceParser = fn(Value) -> serde_json::Result<EvaluationInstance>;
pub type RowMapper = fn(&Value) -> Option<Value>;
pub type ScorerFactory = fn(ScorerContext) -> Result<Box<dyn Scorer>>;

/// Handles a scorer may need at construction.
#[derive(Debug, Clone, Default)]
pub struct ScorerContext {
    pub judge: Option<JudgeHandle>,
}

/// Registration entry for one evaluation type.
#[derive(Clone)]
pub struct EvaluationDefinition {
    pub type_key: &'static str,
    /// Stored as `class_name` on output records
    pub output_class: &'static str,
    /// Scoring issues judge calls; the run must select a judge model
    pub requires_judge: bool,
    pub parse_instance: InstanceParser,
    /// Present for types whose instances come from a `data_url` dataset
    pub dataset_row: Option<RowMapper>,
    /// Order dataset instances by name before truncating
    pub sort_by_name: bool,
    pub build: ScorerFactory,
}

impl std::fmt::Debug for EvaluationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationDefinition")
            .field("type_key", &self.type_key)
            .field("output_class", &self.output_class)
            .field("requires_judge", &self.requires_judge)
            .field("dataset_backed", &self.dataset_row.is_some())
            .finish()
    }
}

impl EvaluationDefinition {
    pub fn is_dataset_backed(&self) -> bool {
        self.dataset_row.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationRegistry {
    definitions: BTreeMap<&'static str, EvaluationDefinition>,
}

impl EvaluationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in evaluation type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(EvaluationDefinition {
            type_key: "contains_pattern",
            output_class: "EvaluationContainsPatternOutput",
            requires_judge: false,
            parse_instance: |doc| EvaluationInstance::parse_as(doc, InstanceParams::Pattern),
            dataset_row: None,
            sort_by_name: false,
            build: |_| Ok(Box::new(PatternScorer)),
        });
        registry.register(EvaluationDefinition {
            type_key: "structured_output",
            output_class: "EvaluationStructuredOutputOutput",
            requires_judge: false,
            parse_instance: |doc| EvaluationInstance::parse_as(doc, InstanceParams::Schema),
            dataset_row: None,
            sort_by_name: false,
            build: |_| Ok(Box::new(SchemaScorer)),
        });
        registry.register(EvaluationDefinition {
            type_key: "mmlu_pro",
            output_class: "EvaluationMMLUProOutput",
            requires_judge: false,
            parse_instance: |doc| EvaluationInstance::parse_as(doc, InstanceParams::MultipleChoice),
            dataset_row: Some(mmlu_pro_row),
            sort_by_name: false,
            build: |_| Ok(Box::new(MultipleChoiceScorer)),
        });
        registry.register(EvaluationDefinition {
            type_key: "meets_criteria",
            output_class: "EvaluationMeetsCriteriaOutput",
            requires_judge: true,
            parse_instance: |doc| EvaluationInstance::parse_as(doc, InstanceParams::Rubric),
            dataset_row: None,
            sort_by_name: false,
            build: |ctx| {
                let judge = ctx
                    .judge
                    .ok_or_else(|| EvalError::config("meets_criteria requires a judge model"))?;
                Ok(Box::new(RubricScorer::new(judge)))
            },
        });
        registry.register(EvaluationDefinition {
            type_key: "instruction_following",
            output_class: "EvaluationInstructionFollowingOutput",
            requires_judge: false,
            parse_instance: |doc| {
                EvaluationInstance::parse_as(doc, InstanceParams::InstructionFollowing)
            },
            dataset_row: Some(instruction_following_row),
            sort_by_name: true,
            build: |_| Ok(Box::new(InstructionFollowingScorer)),
        });
        registry
    }

    /// Add or replace a definition.
    pub fn register(&mut self, definition: EvaluationDefinition) {
        self.definitions.insert(definition.type_key, definition);
    }

    pub fn get(&self, type_key: &str) -> Option<&EvaluationDefinition> {
        self.definitions.get(type_key)
    }

    /// Definition for `type_key`, or a configuration error naming the
    /// known types.
    pub fn require(&self, type_key: &str) -> Result<&EvaluationDefinition> {
        self.get(type_key).ok_or_else(|| {
            EvalError::config(format!(
                "unknown evaluation type '{}' (known: {})",
                type_key,
                self.type_keys().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn type_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.definitions.keys().copied()
    }
}

/// MMLU-Pro rows: `question_id` becomes the instance name.
fn mmlu_pro_row(row: &Value) -> Option<Value> {
    Some(json!({
        "name": row.get("question_id")?,
        "question": row.get("question")?,
        "options": row.get("options")?,
        "category": row.get("category")?,
        "answer": row.get("answer")?,
    }))
}

/// IFEval rows: `key` becomes the instance name.
fn instruction_following_row(row: &Value) -> Option<Value> {
    Some(json!({
        "name": row.get("key")?,
        "prompt": row.get("prompt")?,
        "instruction_id_list": row.get("instruction_id_list")?,
        "kwargs": row.get("kwargs").cloned().unwrap_or_else(|| json!([])),
    }))
}
