//! Concrete scorers, one per evaluation type.
//!
//! - `pattern`: regular expression search, 0 or 100
//! - `schema`: JSON Schema validation, 0 or 100
//! - `multiple_choice`: letter extraction from reasoning text, 0 or 100
//! - `rubric`: weighted criteria judged by a second model, continuous
//! - `instruction_following`: fraction of verifiable instructions followed

pub mod instruction_following;
pub mod multiple_choice;
pub mod pattern;
pub mod rubric;
pub mod schema;

pub use instruction_following::InstructionFollowingScorer;
pub use multiple_choice::{extract_choice, MultipleChoiceScorer};
pub use pattern::PatternScorer;
pub use rubric::{normalized_weights, JudgeHandle, RubricScorer};
pub use schema::{check_schema, SchemaScorer};

use crate::domain::{EvalError, EvaluationInstance};
use crate::scorer::{RawResult, ScoreOutcome};

/// Error for an instance whose parameters belong to another evaluation type.
pub(crate) fn params_mismatch(expected: &str, instance: &EvaluationInstance) -> EvalError {
    EvalError::Configuration(format!(
        "instance '{}' has {} parameters, expected {}",
        instance.name,
        instance.params.kind(),
        expected
    ))
}

/// The first generation, or the outcome to return when it is missing or
/// blank.
pub(crate) fn response_text(raw: &RawResult) -> Result<&str, ScoreOutcome> {
    match raw.first() {
        None => Err(ScoreOutcome::failed("no response was generated")),
        Some(text) if text.trim().is_empty() => Err(ScoreOutcome::failed("response is empty")),
        Some(text) => Ok(text),
    }
}
