//! `contains_pattern`: does the response contain a regular expression match?

use async_trait::async_trait;
use chrono::Local;
use llm_transport::{ChatMessage, CompletionRequest, CompletionTransport};
use regex::Regex;

use super::{params_mismatch, response_text};
use crate::domain::{EvaluationInstance, InstanceParams, PatternParams, Result};
use crate::scorer::{generate_once, RawResult, ScoreOutcome, Scorer};

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 1000;

fn default_system_prompt() -> String {
    format!(
        "- You are a helpful assistant.\n\
         - The current date is {}.\n\
         - Your should answer questions truthfully and accurately.",
        Local::now().format("%Y-%m-%d")
    )
}

/// Binary regular expression scorer.
#[derive(Debug, Default)]
pub struct PatternScorer;

impl PatternScorer {
    fn params<'a>(&self, instance: &'a EvaluationInstance) -> Option<&'a PatternParams> {
        match &instance.params {
            InstanceParams::Pattern(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Scorer for PatternScorer {
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult> {
        let params = self
            .params(instance)
            .ok_or_else(|| params_mismatch("pattern", instance))?;

        let system = params
            .system_prompt
            .clone()
            .unwrap_or_else(default_system_prompt);
        let request = CompletionRequest::new(
            model,
            vec![ChatMessage::system(system), ChatMessage::user(&params.prompt)],
        )
        .with_temperature(TEMPERATURE)
        .with_max_tokens(MAX_TOKENS);

        generate_once(transport, request).await
    }

    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome {
        let Some(params) = self.params(instance) else {
            return ScoreOutcome::failed(params_mismatch("pattern", instance).to_string());
        };
        let text = match response_text(raw) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };

        // Compiled per call; patterns differ per instance.
        match Regex::new(&params.pattern) {
            Ok(re) => ScoreOutcome::binary(re.is_match(text)),
            Err(e) => ScoreOutcome::failed(format!("invalid pattern: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_transport::fakes::ScriptedTransport;
    use llm_transport::Role;

    fn instance(pattern: &str) -> EvaluationInstance {
        EvaluationInstance::new(
            "answer",
            InstanceParams::Pattern(PatternParams {
                prompt: "What is 6 * 7?".to_string(),
                pattern: pattern.to_string(),
                system_prompt: None,
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
    async fn test_any_match_scores_100() {
        let outcome = PatternScorer.score(&raw("The result is 42"), &instance(r"\d+")).await;
        assert_eq!(outcome.score(), 100.0);
    }

    #[tokio::test]
    async fn test_anchored_pattern_scores_0() {
        let outcome = PatternScorer
            .score(&raw("The result is 42"), &instance(r"^\d+$"))
            .await;
        assert_eq!(outcome.score(), 0.0);
        assert!(!outcome.is_failed());
    }

    #[tokio::test]
    async fn test_empty_response_scores_0() {
        let outcome = PatternScorer.score(&raw("   "), &instance(r".*")).await;
        assert_eq!(outcome.score(), 0.0);
        assert!(outcome.is_failed());

        let outcome = PatternScorer.score(&RawResult::new(), &instance(r".*")).await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_invalid_pattern_downgrades() {
        let outcome = PatternScorer.score(&raw("42"), &instance(r"(")).await;
        assert_eq!(outcome.score(), 0.0);
        assert!(outcome.diagnostic().unwrap().contains("invalid pattern"));
    }

    #[tokio::test]
    async fn test_generate_uses_default_system_prompt() {
        let transport = ScriptedTransport::always("42");
        let raw = PatternScorer
            .generate(&instance(r"42"), "llama3.1:8b", &transport)
            .await
            .unwrap();
        assert_eq!(raw.first(), Some("42"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "llama3.1:8b");
        assert_eq!(request.max_completion_tokens, 1000);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("The current date is"));
        assert_eq!(request.messages[1].content, "What is 6 * 7?");
    }

    #[tokio::test]
    async fn test_generate_propagates_transport_error() {
        let transport = ScriptedTransport::new().fail("connection refused");
        let err = PatternScorer
            .generate(&instance(r"42"), "m", &transport)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::domain::EvalError::Transport(_)));
    }
}
