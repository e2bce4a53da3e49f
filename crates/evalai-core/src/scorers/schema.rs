//! `structured_output`: is the response a JSON value valid against a schema?

use async_trait::async_trait;
use llm_transport::{ChatMessage, CompletionRequest, CompletionTransport};
use serde_json::Value;

use super::{params_mismatch, response_text};
use crate::domain::{EvaluationInstance, InstanceParams, Result, SchemaParams};
use crate::scorer::{generate_once, RawResult, ScoreOutcome, Scorer};
use crate::text::strip_code_fences;

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 1000;
const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that is answering tasks in a structured JSON format.";

/// Compile `schema`, reporting why it is not a usable JSON Schema.
///
/// Malformed schemas are configuration errors; call this at load time.
pub fn check_schema(schema: &Value) -> std::result::Result<(), String> {
    jsonschema::validator_for(schema)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Binary JSON Schema scorer.
#[derive(Debug, Default)]
pub struct SchemaScorer;

impl SchemaScorer {
    fn params<'a>(&self, instance: &'a EvaluationInstance) -> Option<&'a SchemaParams> {
        match &instance.params {
            InstanceParams::Schema(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Scorer for SchemaScorer {
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult> {
        let params = self
            .params(instance)
            .ok_or_else(|| params_mismatch("schema", instance))?;

        let request = CompletionRequest::new(
            model,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(&params.prompt),
            ],
        )
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS)
        .with_json_mode(true);

        generate_once(transport, request).await
    }

    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome {
        let Some(params) = self.params(instance) else {
            return ScoreOutcome::failed(params_mismatch("schema", instance).to_string());
        };
        let text = match response_text(raw) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };

        let value: Value = match serde_json::from_str(strip_code_fences(text)) {
            Ok(value) => value,
            Err(e) => return ScoreOutcome::failed(format!("response is not valid JSON: {e}")),
        };

        let validator = match jsonschema::validator_for(&params.schema) {
            Ok(validator) => validator,
            Err(e) => return ScoreOutcome::failed(format!("invalid schema: {e}")),
        };

        // Only the first violation is reported.
        let first_error = validator.iter_errors(&value).next().map(|error| {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            format!("{path}: {error}")
        });
        match first_error {
            None => ScoreOutcome::binary(true),
            Some(diagnostic) => ScoreOutcome::binary_with(false, diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> EvaluationInstance {
        EvaluationInstance::new(
            "person",
            InstanceParams::Schema(SchemaParams {
                prompt: "Describe Ada Lovelace as JSON".to_string(),
                schema: json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "const": "Ada Lovelace"},
                        "born": {"type": "integer"}
                    },
                    "required": ["name", "born"]
                }),
            }),
        )
    }

    fn raw(text: &str) -> RawResult {
        RawResult {
            messages: vec![text.to_string()],
            ..RawResult::default()
        }
    }

    #[tokio::test]
    async fn test_matching_response_scores_100() {
        let outcome = SchemaScorer
            .score(&raw(r#"{"name": "Ada Lovelace", "born": 1815}"#), &instance())
            .await;
        assert_eq!(outcome.score(), 100.0);
        assert!(outcome.diagnostic().is_none());
    }

    #[tokio::test]
    async fn test_missing_required_key_names_key() {
        let outcome = SchemaScorer
            .score(&raw(r#"{"name": "Ada Lovelace"}"#), &instance())
            .await;
        assert_eq!(outcome.score(), 0.0);
        assert!(outcome.diagnostic().unwrap().contains("born"));
    }

    #[tokio::test]
    async fn test_wrong_type_reports_path() {
        let outcome = SchemaScorer
            .score(&raw(r#"{"name": "Ada Lovelace", "born": "1815"}"#), &instance())
            .await;
        assert_eq!(outcome.score(), 0.0);
        assert!(outcome.diagnostic().unwrap().starts_with("/born"));
    }

    #[tokio::test]
    async fn test_code_fenced_json_is_accepted() {
        let text = "```json\n{\"name\": \"Ada Lovelace\", \"born\": 1815}\n```";
        let outcome = SchemaScorer.score(&raw(text), &instance()).await;
        assert_eq!(outcome.score(), 100.0);
    }

    #[tokio::test]
    async fn test_non_json_downgrades() {
        let outcome = SchemaScorer.score(&raw("Ada was born in 1815."), &instance()).await;
        assert_eq!(outcome.score(), 0.0);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_check_schema() {
        assert!(check_schema(&json!({"type": "object"})).is_ok());
        assert!(check_schema(&json!({"type": "not-a-type"})).is_err());
        assert!(check_schema(&json!({"minLength": "three"})).is_err());
    }
}
