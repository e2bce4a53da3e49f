//! Load-time checks for evaluation instances.
//!
//! Every problem found here is a configuration error: malformed schemas,
//! patterns that do not compile, unknown instruction ids and the like must
//! surface before any completion is requested, never as a scoring outcome.

use std::collections::HashSet;

use regex::Regex;

use crate::domain::{EvaluationInstance, InstanceParams, CHOICE_LETTERS};
use crate::ifeval::{build_instruction, find_conflict, normalize_kwargs};
use crate::scorers::check_schema;

/// Reason an instance cannot be executed.
pub type Invalid = std::result::Result<(), String>;

/// Type-specific checks of one instance's parameters.
pub fn validate_params(instance: &EvaluationInstance) -> Invalid {
    if instance.name.trim().is_empty() {
        return Err("instance name is empty".to_string());
    }
    match &instance.params {
        InstanceParams::Pattern(p) => Regex::new(&p.pattern)
            .map(|_| ())
            .map_err(|e| format!("pattern does not compile: {e}")),
        InstanceParams::Schema(p) => {
            check_schema(&p.schema).map_err(|e| format!("schema self-test failed: {e}"))
        }
        InstanceParams::MultipleChoice(p) => {
            if p.options.is_empty() || p.options.len() > CHOICE_LETTERS.len() {
                return Err(format!(
                    "expected 1 to {} options, got {}",
                    CHOICE_LETTERS.len(),
                    p.options.len()
                ));
            }
            let answer = p.answer.trim();
            let valid = answer.len() == 1
                && CHOICE_LETTERS[..p.options.len()].contains(answer);
            if valid {
                Ok(())
            } else {
                Err(format!(
                    "answer '{}' is not one of the {} option letters",
                    p.answer,
                    p.options.len()
                ))
            }
        }
        InstanceParams::Rubric(p) => {
            if p.semantic_criteria.is_empty() {
                return Err("semantic_criteria is empty".to_string());
            }
            match p
                .semantic_criteria
                .iter()
                .find(|c| !c.importance.is_finite() || c.importance < 0.0)
            {
                Some(c) => Err(format!(
                    "criterion '{}' has invalid importance {}",
                    c.criteria, c.importance
                )),
                None => Ok(()),
            }
        }
        InstanceParams::InstructionFollowing(p) => {
            if p.instruction_id_list.is_empty() {
                return Err("instruction_id_list is empty".to_string());
            }
            for (i, id) in p.instruction_id_list.iter().enumerate() {
                build_instruction(id, &normalize_kwargs(&p.kwargs_for(i)))
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        }
    }
}

/// Reject instruction combinations the conflict table forbids.
pub fn validate_conflicts(instance: &EvaluationInstance) -> Invalid {
    let InstanceParams::InstructionFollowing(p) = &instance.params else {
        return Ok(());
    };
    match find_conflict(&p.instruction_id_list) {
        Some((a, b)) if a == b => Err(format!("instruction '{a}' appears more than once")),
        Some((a, b)) => Err(format!("instructions '{a}' and '{b}' conflict")),
        None => Ok(()),
    }
}

/// Instance names must be unique within one evaluation.
pub fn validate_unique_names(instances: &[EvaluationInstance]) -> Invalid {
    let mut seen = HashSet::new();
    for instance in instances {
        if !seen.insert(instance.name.as_str()) {
            return Err(format!("duplicate instance name '{}'", instance.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InstructionParams, MultipleChoiceParams, PatternParams, RubricParams, SchemaParams,
        SemanticCriterion,
    };
    use serde_json::{json, Map};

    fn pattern(name: &str, pattern: &str) -> EvaluationInstance {
        EvaluationInstance::new(
            name,
            InstanceParams::Pattern(PatternParams {
                prompt: "p".to_string(),
                pattern: pattern.to_string(),
                system_prompt: None,
            }),
        )
    }

    fn instructions(ids: &[&str]) -> EvaluationInstance {
        EvaluationInstance::new(
            "if",
            InstanceParams::InstructionFollowing(InstructionParams {
                prompt: "p".to_string(),
                instruction_id_list: ids.iter().map(|s| s.to_string()).collect(),
                kwargs: vec![Map::new(); ids.len()],
            }),
        )
    }

    #[test]
    fn test_pattern_must_compile() {
        assert!(validate_params(&pattern("a", r"\d+")).is_ok());
        assert!(validate_params(&pattern("a", r"(")).is_err());
        assert!(validate_params(&pattern(" ", r"x")).is_err());
    }

    #[test]
    fn test_schema_self_test() {
        let instance = EvaluationInstance::new(
            "s",
            InstanceParams::Schema(SchemaParams {
                prompt: "p".to_string(),
                schema: json!({"minLength": "three"}),
            }),
        );
        let err = validate_params(&instance).unwrap_err();
        assert!(err.contains("schema self-test failed"));
    }

    #[test]
    fn test_multiple_choice_answer_letter() {
        let mut params = MultipleChoiceParams {
            question: "q".to_string(),
            options: vec!["x".to_string(), "y".to_string()],
            category: "c".to_string(),
            answer: "B".to_string(),
        };
        let ok = EvaluationInstance::new("m", InstanceParams::MultipleChoice(params.clone()));
        assert!(validate_params(&ok).is_ok());

        params.answer = "C".to_string();
        let bad = EvaluationInstance::new("m", InstanceParams::MultipleChoice(params));
        assert!(validate_params(&bad).is_err());
    }

    #[test]
    fn test_rubric_needs_criteria() {
        let instance = EvaluationInstance::new(
            "r",
            InstanceParams::Rubric(RubricParams {
                prompt: "p".to_string(),
                semantic_criteria: vec![],
            }),
        );
        assert!(validate_params(&instance).is_err());

        let instance = EvaluationInstance::new(
            "r",
            InstanceParams::Rubric(RubricParams {
                prompt: "p".to_string(),
                semantic_criteria: vec![SemanticCriterion {
                    criteria: "c".to_string(),
                    importance: -1.0,
                }],
            }),
        );
        assert!(validate_params(&instance).is_err());
    }

    #[test]
    fn test_unknown_instruction_rejected() {
        let err = validate_params(&instructions(&["punctuation:no_semicolon"])).unwrap_err();
        assert!(err.contains("unknown instruction id"));
    }

    #[test]
    fn test_conflicting_instructions_rejected() {
        assert!(validate_conflicts(&instructions(&["punctuation:no_comma", "startend:quotation"])).is_ok());

        let err = validate_conflicts(&instructions(&[
            "change_case:english_capital",
            "change_case:english_lowercase",
        ]))
        .unwrap_err();
        assert!(err.contains("conflict"));

        let err = validate_conflicts(&instructions(&["punctuation:no_comma", "punctuation:no_comma"]))
            .unwrap_err();
        assert!(err.contains("more than once"));
    }

    #[test]
    fn test_duplicate_names() {
        let instances = vec![pattern("a", "x"), pattern("b", "x"), pattern("a", "y")];
        let err = validate_unique_names(&instances).unwrap_err();
        assert!(err.contains("'a'"));
        assert!(validate_unique_names(&instances[..2]).is_ok());
    }
}
