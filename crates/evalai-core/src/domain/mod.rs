//! Domain models for EvalAI.
//!
//! Canonical definitions for the core entities:
//! - `EvaluationInstance`: one concrete test case, typed per evaluation
//! - `ExecutionKey`: identity of one (evaluation, model, provider, instance)
//! - `EvaluationOutput`: scored result of one execution

pub mod error;
pub mod instance;
pub mod key;
pub mod output;

// Re-export main types and errors
pub use error::{EvalError, Result};
pub use instance::{
    EvaluationInstance, InstanceParams, InstructionParams, MultipleChoiceParams, PatternParams,
    RubricParams, SchemaParams, SemanticCriterion, CHOICE_LETTERS,
};
pub use key::ExecutionKey;
pub use output::{normalize_score, EvaluationOutput};
