//! `meets_criteria`: multi-stage LLM-as-judge rubric scoring.
//!
//! One call produces the candidate answer. Scoring then runs two judge calls
//! per criterion:
//! 1. reasoning: think step by step, finish with `true` or `false`
//! 2. extraction: convert that reasoning into `{"answer": true|false}`
//!
//! Criterion weights are normalized to sum to 100 for each instance. A
//! criterion whose judge call fails or whose extraction does not parse
//! contributes 0; the loop always continues. Reasoning traces are kept as
//! the diagnostic.
//!
//! `score` issues judge calls through the scorer's own [`JudgeHandle`],
//! never through the transport of the model under test.

use std::sync::Arc;

use async_trait::async_trait;
use llm_transport::{ChatMessage, CompletionRequest, CompletionTransport};
use serde::Deserialize;
use tracing::warn;

use super::{params_mismatch, response_text};
use crate::domain::{EvaluationInstance, InstanceParams, Result, RubricParams, SemanticCriterion};
use crate::scorer::{complete, generate_once, RawResult, ScoreOutcome, Scorer};
use crate::text::{strip_code_fences, strip_thinking};

const ANSWER_TEMPERATURE: f32 = 0.5;
const ANSWER_MAX_TOKENS: u32 = 4000;
const REASONING_TEMPERATURE: f32 = 0.3;
const REASONING_MAX_TOKENS: u32 = 3000;
const EXTRACTION_TEMPERATURE: f32 = 0.0;
const EXTRACTION_MAX_TOKENS: u32 = 3000;

const ANSWER_SYSTEM: &str = "You are a helpful assistant that is answering requests for a user.";

const REASONING_SYSTEM: &str = r#"You are evaluating how well a response meets a given criteria. Each can either be met or not met. You must make a choice.
First, for the criteria, first think step by step about if the response meets the criteria.
Then as your final answer write down true or false. true means the criteria is met and false means it is not met. Below is an example of the process.

RESPONSE:
There have been many incredible football games over the years, each memorable for different reasons. Here are a few that often come up in discussions:

1. **Super Bowl LI (2017)**: New England Patriots vs. Atlanta Falcons
   - The Patriots made a historic comeback from a 28-3 deficit to win 34-28 in overtime, the first Super Bowl to go into overtime.

2. **The "Tuck Rule" Game (2002)**: New England Patriots vs. Oakland Raiders
   - Known for the controversial "tuck rule" call, this game saw the Patriots win 16-13 in overtime, propelling them to their first Super Bowl victory.

3. **Super Bowl XXIII (1989)**: San Francisco 49ers vs. Cincinnati Bengals
   - Joe Montana led a 92-yard drive in the final minutes to secure a 20-16 victory for the 49ers.

CRITERIA:
The first two games should not both include the New England Patriots.

SAMPLE ANSWER:
The first game mentioned, Super Bowl LI, involves the Patriots. The second game, the Tuck Rule Game, also involves the Patriots. Therefore the criteria is NOT met. Therefore the final output is: false"#;

const EXTRACTION_SYSTEM: &str = r#"You are a helpful, thoughtful, and meticulous assistant. You will be given text which you must parse out a true or false answer from.
Your final output should be a very simple JSON object: { "answer" : true } or { "answer" : false }.

Below is the an example of the process.

RESPONSE:
The first game mentioned, Super Bowl LI, involves the Patriots. The second game, the Tuck Rule Game, also involves the Patriots. Therefore the criteria is NOT met. Therefore the final output is: false

SAMPLE JSON:
{ "answer" : false }"#;

fn reasoning_user(response: &str, criteria: &str) -> String {
    format!(
        "RESPONSE:\n{response}\n\nCRITERIA:\n{criteria}\n\nNow first think step by step if the \
         response meets the criteria and then write either true or false as your final answer."
    )
}

fn extraction_user(reasoning: &str) -> String {
    format!(
        "RESPONSE:\n{reasoning}\n\nNow convert that response into JSON following the format: \
         {{ \"answer\" : true }} or {{ \"answer\" : false }}"
    )
}

/// Judge model used for secondary scoring calls.
#[derive(Clone)]
pub struct JudgeHandle {
    pub transport: Arc<dyn CompletionTransport>,
    pub provider: String,
    pub model: String,
}

impl std::fmt::Debug for JudgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeHandle")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .finish()
    }
}

/// Weights normalized to sum to 100.
///
/// A non-positive total (all weights zero) falls back to equal weights.
pub fn normalized_weights(criteria: &[SemanticCriterion]) -> Vec<f64> {
    if criteria.is_empty() {
        return Vec::new();
    }
    let total: f64 = criteria.iter().map(|c| c.importance.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        let equal = 100.0 / criteria.len() as f64;
        return vec![equal; criteria.len()];
    }
    criteria
        .iter()
        .map(|c| c.importance.max(0.0) / total * 100.0)
        .collect()
}

#[derive(Debug, Deserialize)]
struct Verdict {
    answer: bool,
}

/// Result of judging one criterion.
enum CriterionVerdict {
    Met,
    NotMet,
    Unresolved(String),
}

/// Weighted-rubric scorer backed by a judge model.
#[derive(Debug)]
pub struct RubricScorer {
    judge: JudgeHandle,
}

impl RubricScorer {
    pub fn new(judge: JudgeHandle) -> Self {
        Self { judge }
    }

    fn params<'a>(&self, instance: &'a EvaluationInstance) -> Option<&'a RubricParams> {
        match &instance.params {
            InstanceParams::Rubric(p) => Some(p),
            _ => None,
        }
    }

    /// Reasoning then extraction for one criterion. Returns the reasoning
    /// trace (if any) and the verdict.
    async fn judge_criterion(&self, response: &str, criteria: &str) -> (String, CriterionVerdict) {
        let transport = self.judge.transport.as_ref();

        let reasoning_request = CompletionRequest::new(
            &self.judge.model,
            vec![
                ChatMessage::system(REASONING_SYSTEM),
                ChatMessage::user(reasoning_user(response, criteria)),
            ],
        )
        .with_temperature(REASONING_TEMPERATURE)
        .with_max_tokens(REASONING_MAX_TOKENS);

        let reasoning = match complete(transport, &reasoning_request).await {
            Ok(resp) => resp.text,
            Err(e) => {
                return (
                    String::new(),
                    CriterionVerdict::Unresolved(format!("reasoning call failed: {e}")),
                )
            }
        };

        let extraction_request = CompletionRequest::new(
            &self.judge.model,
            vec![
                ChatMessage::system(EXTRACTION_SYSTEM),
                ChatMessage::user(extraction_user(&reasoning)),
            ],
        )
        .with_temperature(EXTRACTION_TEMPERATURE)
        .with_max_tokens(EXTRACTION_MAX_TOKENS)
        .with_json_mode(true);

        let verdict = match complete(transport, &extraction_request).await {
            Ok(resp) => match serde_json::from_str::<Verdict>(strip_code_fences(&resp.text)) {
                Ok(Verdict { answer: true }) => CriterionVerdict::Met,
                Ok(Verdict { answer: false }) => CriterionVerdict::NotMet,
                Err(e) => CriterionVerdict::Unresolved(format!("unparseable verdict: {e}")),
            },
            Err(e) => CriterionVerdict::Unresolved(format!("extraction call failed: {e}")),
        };
        (reasoning, verdict)
    }
}

#[async_trait]
impl Scorer for RubricScorer {
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult> {
        let params = self
            .params(instance)
            .ok_or_else(|| params_mismatch("rubric", instance))?;

        let request = CompletionRequest::new(
            model,
            vec![
                ChatMessage::system(ANSWER_SYSTEM),
                ChatMessage::user(&params.prompt),
            ],
        )
        .with_temperature(ANSWER_TEMPERATURE)
        .with_max_tokens(ANSWER_MAX_TOKENS);

        generate_once(transport, request).await
    }

    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome {
        let Some(params) = self.params(instance) else {
            return ScoreOutcome::failed(params_mismatch("rubric", instance).to_string());
        };
        if params.semantic_criteria.is_empty() {
            return ScoreOutcome::failed("no semantic criteria");
        }
        let text = match response_text(raw) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };
        let response = strip_thinking(text);

        let weights = normalized_weights(&params.semantic_criteria);
        let mut score = 0.0;
        let mut trace = Vec::with_capacity(weights.len());

        for (i, (criterion, weight)) in params.semantic_criteria.iter().zip(&weights).enumerate() {
            let (reasoning, verdict) = self.judge_criterion(&response, &criterion.criteria).await;
            let label = match &verdict {
                CriterionVerdict::Met => {
                    score += weight;
                    "met".to_string()
                }
                CriterionVerdict::NotMet => "not met".to_string(),
                CriterionVerdict::Unresolved(reason) => {
                    warn!(
                        instance = %instance.name,
                        criterion = i + 1,
                        judge = %self.judge.model,
                        "criterion unresolved: {}",
                        reason
                    );
                    format!("unresolved ({reason})")
                }
            };
            trace.push(format!(
                "[{}] {} (weight {:.2}): {}\n{}",
                i + 1,
                criterion.criteria,
                weight,
                label,
                reasoning.trim()
            ));
        }

        ScoreOutcome::Scored {
            score: crate::domain::normalize_score(score),
            diagnostic: Some(trace.join("\n\n")),
        }
    }
}
