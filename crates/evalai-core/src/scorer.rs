//! The scorer contract.
//!
//! Every evaluation type implements [`Scorer`]:
//! - `generate` performs the completion call(s) and never scores
//! - `score` turns the raw result into a number in [0, 100] and never fails
//!
//! `score` must not call the instance transport. The rubric scorer is the
//! one scorer whose `score` issues secondary calls, to its own judge handle.

use async_trait::async_trait;
use llm_transport::{CompletionRequest, CompletionResponse, CompletionTransport};

use crate::domain::{normalize_score, EvaluationInstance, Result};
use crate::metrics::METRICS;

/// Raw generation output, accumulated over one or more completion calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub messages: Vec<String>,
    pub prompt_tokens_total: u64,
    pub completion_tokens_total: u64,
    pub duration_sec_total: f64,
}

impl RawResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completion and add its usage to the totals.
    pub fn record(&mut self, response: CompletionResponse) {
        self.prompt_tokens_total += response.prompt_tokens;
        self.completion_tokens_total += response.completion_tokens;
        self.duration_sec_total += response.duration_seconds;
        self.messages.push(response.text);
    }

    /// The single generation most scorers address, `raw_result[0]`.
    pub fn first(&self) -> Option<&str> {
        self.messages.first().map(String::as_str)
    }
}

/// Outcome of `Scorer::score`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// A score was computed. `diagnostic` may carry a validation failure
    /// path or a judge reasoning trace.
    Scored {
        score: f64,
        diagnostic: Option<String>,
    },
    /// Extraction or validation could not run; counts as 0.
    Failed { diagnostic: String },
}

impl ScoreOutcome {
    /// Binary pass/fail score: exactly 100 or 0.
    pub fn binary(passed: bool) -> Self {
        ScoreOutcome::Scored {
            score: if passed { 100.0 } else { 0.0 },
            diagnostic: None,
        }
    }

    /// Binary score with a diagnostic attached.
    pub fn binary_with(passed: bool, diagnostic: impl Into<String>) -> Self {
        ScoreOutcome::Scored {
            score: if passed { 100.0 } else { 0.0 },
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn scored(score: f64) -> Self {
        ScoreOutcome::Scored {
            score: normalize_score(score),
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        ScoreOutcome::Failed {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            ScoreOutcome::Scored { score, .. } => *score,
            ScoreOutcome::Failed { .. } => 0.0,
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ScoreOutcome::Scored { diagnostic, .. } => diagnostic.as_deref(),
            ScoreOutcome::Failed { diagnostic } => Some(diagnostic),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScoreOutcome::Failed { .. })
    }
}

/// One evaluation type's generate + score pair.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Produce the model completion(s) for `instance`. Transport errors are
    /// returned unchanged.
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult>;

    /// Score a raw result. Never fails; problems become
    /// `ScoreOutcome::Failed`.
    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome;
}

/// Issue one completion call and count it.
pub(crate) async fn complete(
    transport: &dyn CompletionTransport,
    request: &CompletionRequest,
) -> llm_transport::Result<CompletionResponse> {
    METRICS.inc_completions();
    transport.complete(request).await
}

/// Run one request and collect it into a fresh `RawResult`.
pub(crate) async fn generate_once(
    transport: &dyn CompletionTransport,
    request: CompletionRequest,
) -> Result<RawResult> {
    let response = complete(transport, &request).await?;
    let mut raw = RawResult::new();
    raw.record(response);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_accumulates() {
        let mut raw = RawResult::new();
        raw.record(CompletionResponse {
            text: "a".to_string(),
            prompt_tokens: 10,
            completion_tokens: 2,
            duration_seconds: 0.5,
        });
        raw.record(CompletionResponse {
            text: "b".to_string(),
            prompt_tokens: 5,
            completion_tokens: 3,
            duration_seconds: 0.25,
        });
        assert_eq!(raw.first(), Some("a"));
        assert_eq!(raw.messages.len(), 2);
        assert_eq!(raw.prompt_tokens_total, 15);
        assert_eq!(raw.completion_tokens_total, 5);
        assert!((raw.duration_sec_total - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_outcome_scores_zero() {
        let outcome = ScoreOutcome::failed("no response");
        assert_eq!(outcome.score(), 0.0);
        assert_eq!(outcome.diagnostic(), Some("no response"));
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_binary_outcomes() {
        assert_eq!(ScoreOutcome::binary(true).score(), 100.0);
        assert_eq!(ScoreOutcome::binary(false).score(), 0.0);
        assert_eq!(ScoreOutcome::scored(49.999).score(), 50.0);
    }
}
