//! Evaluation instances: one concrete test case per record.
//!
//! Instance documents carry no type tag of their own; the evaluation type
//! comes from the definition file's `run_config`. Each type parses its
//! instances into its own parameter struct, and [`InstanceParams`] is the
//! tagged union the runner and scorers dispatch on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Letters used to label multiple-choice options, in order.
pub const CHOICE_LETTERS: &str = "ABCDEFGHIJ";

/// Parameters for `contains_pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternParams {
    pub prompt: String,
    /// Regular expression searched for anywhere in the response
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Parameters for `structured_output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaParams {
    pub prompt: String,
    /// JSON Schema the response must satisfy
    pub schema: Value,
}

/// Parameters for `mmlu_pro`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceParams {
    pub question: String,
    pub options: Vec<String>,
    pub category: String,
    /// Expected letter, `A` through `J`
    pub answer: String,
}

/// One weighted criterion of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticCriterion {
    pub criteria: String,
    pub importance: f64,
}

/// Parameters for `meets_criteria`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricParams {
    pub prompt: String,
    pub semantic_criteria: Vec<SemanticCriterion>,
}

/// Parameters for `instruction_following`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionParams {
    pub prompt: String,
    pub instruction_id_list: Vec<String>,
    /// Keyword arguments, one map per instruction id
    #[serde(default)]
    pub kwargs: Vec<Map<String, Value>>,
}

impl InstructionParams {
    /// Keyword arguments for the instruction at `index`, with `null` values
    /// dropped. Missing maps are treated as empty.
    pub fn kwargs_for(&self, index: usize) -> Map<String, Value> {
        self.kwargs
            .get(index)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Scorer-specific parameters, one variant per evaluation type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InstanceParams {
    Pattern(PatternParams),
    Schema(SchemaParams),
    MultipleChoice(MultipleChoiceParams),
    Rubric(RubricParams),
    InstructionFollowing(InstructionParams),
}

impl InstanceParams {
    pub fn kind(&self) -> &'static str {
        match self {
            InstanceParams::Pattern(_) => "pattern",
            InstanceParams::Schema(_) => "schema",
            InstanceParams::MultipleChoice(_) => "multiple_choice",
            InstanceParams::Rubric(_) => "rubric",
            InstanceParams::InstructionFollowing(_) => "instruction_following",
        }
    }
}

/// One concrete test case. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationInstance {
    /// Unique within its evaluation
    pub name: String,
    #[serde(flatten)]
    pub params: InstanceParams,
}

/// Wire shape shared by every instance document: `name` plus the type's
/// own fields.
#[derive(Debug, Deserialize)]
struct NamedDocument<P> {
    name: NameField,
    #[serde(flatten)]
    params: P,
}

/// Dataset keys are often integers; names are always strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameField {
    Text(String),
    Number(serde_json::Number),
}

impl NameField {
    fn into_string(self) -> String {
        match self {
            NameField::Text(s) => s,
            NameField::Number(n) => n.to_string(),
        }
    }
}

impl EvaluationInstance {
    pub fn new(name: impl Into<String>, params: InstanceParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Parse a `name` + parameter document into an instance, wrapping the
    /// typed parameters with `wrap`.
    pub fn parse_as<P, F>(document: Value, wrap: F) -> serde_json::Result<Self>
    where
        P: serde::de::DeserializeOwned,
        F: FnOnce(P) -> InstanceParams,
    {
        let doc: NamedDocument<P> = serde_json::from_value(document)?;
        Ok(Self {
            name: doc.name.into_string(),
            params: wrap(doc.params),
        })
    }

    /// JSON document persisted as `evaluation_instance` on output records.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            let mut map = Map::new();
            map.insert("name".to_string(), Value::String(self.name.clone()));
            Value::Object(map)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pattern_instance() {
        let doc = json!({"name": "capital", "prompt": "Capital of France?", "pattern": "(?i)paris"});
        let instance = EvaluationInstance::parse_as(doc, InstanceParams::Pattern).unwrap();
        assert_eq!(instance.name, "capital");
        match &instance.params {
            InstanceParams::Pattern(p) => {
                assert_eq!(p.pattern, "(?i)paris");
                assert!(p.system_prompt.is_none());
            }
            other => panic!("unexpected params: {}", other.kind()),
        }
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let doc = json!({"name": "capital", "prompt": "Capital of France?"});
        assert!(EvaluationInstance::parse_as(doc, InstanceParams::Pattern).is_err());
    }

    #[test]
    fn test_numeric_name_becomes_string() {
        let doc = json!({
            "name": 1001,
            "prompt": "Write a haiku",
            "instruction_id_list": ["punctuation:no_comma"],
            "kwargs": [{}],
        });
        let instance =
            EvaluationInstance::parse_as(doc, InstanceParams::InstructionFollowing).unwrap();
        assert_eq!(instance.name, "1001");
    }

    #[test]
    fn test_document_is_flat() {
        let instance = EvaluationInstance::new(
            "q1",
            InstanceParams::MultipleChoice(MultipleChoiceParams {
                question: "2+2?".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                category: "math".to_string(),
                answer: "B".to_string(),
            }),
        );
        let doc = instance.to_document();
        assert_eq!(doc["name"], "q1");
        assert_eq!(doc["answer"], "B");
        assert_eq!(doc["options"][1], "4");
    }

    #[test]
    fn test_kwargs_for_drops_nulls() {
        let params = InstructionParams {
            prompt: "p".to_string(),
            instruction_id_list: vec!["a".to_string(), "b".to_string()],
            kwargs: vec![
                serde_json::from_value(json!({"num_words": 300, "relation": "less than", "keywords": null}))
                    .unwrap(),
            ],
        };
        let first = params.kwargs_for(0);
        assert_eq!(first.len(), 2);
        assert!(!first.contains_key("keywords"));
        assert!(params.kwargs_for(1).is_empty());
    }
}
