//! `instruction_following`: fraction of verifiable instructions a response
//! follows.
//!
//! Each instruction id is turned into a checker from its normalized keyword
//! arguments. A checker that cannot be built counts as not followed. The
//! conflict table is not consulted here.

use async_trait::async_trait;
use llm_transport::{ChatMessage, CompletionRequest, CompletionTransport};

use super::params_mismatch;
use crate::domain::{EvaluationInstance, InstanceParams, InstructionParams, Result};
use crate::ifeval::{build_instruction, normalize_kwargs, Instruction, InstructionError};
use crate::scorer::{generate_once, RawResult, ScoreOutcome, Scorer};

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 2000;

/// Build every checker an instance declares, in declaration order.
pub fn build_checkers(
    params: &InstructionParams,
) -> Vec<(String, std::result::Result<Instruction, InstructionError>)> {
    params
        .instruction_id_list
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let kwargs = normalize_kwargs(&params.kwargs_for(i));
            (id.clone(), build_instruction(id, &kwargs))
        })
        .collect()
}

/// Multi-check instruction-following scorer.
#[derive(Debug, Default)]
pub struct InstructionFollowingScorer;

impl InstructionFollowingScorer {
    fn params<'a>(&self, instance: &'a EvaluationInstance) -> Option<&'a InstructionParams> {
        match &instance.params {
            InstanceParams::InstructionFollowing(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Scorer for InstructionFollowingScorer {
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult> {
        let params = self
            .params(instance)
            .ok_or_else(|| params_mismatch("instruction_following", instance))?;

        let request = CompletionRequest::new(model, vec![ChatMessage::user(&params.prompt)])
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        generate_once(transport, request).await
    }

    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome {
        let Some(params) = self.params(instance) else {
            return ScoreOutcome::failed(params_mismatch("instruction_following", instance).to_string());
        };
        if params.instruction_id_list.is_empty() {
            return ScoreOutcome::failed("no instructions to check");
        }
        let response = raw.first().unwrap_or_default();

        let checkers = build_checkers(params);
        let total = checkers.len();
        let mut missed = Vec::new();
        for (id, checker) in &checkers {
            match checker {
                Ok(instruction) if instruction.is_followed_by(response) => {}
                Ok(_) => missed.push(id.clone()),
                Err(e) => missed.push(format!("{id} ({e})")),
            }
        }
        let passed = total - missed.len();

        ScoreOutcome::Scored {
            score: crate::domain::normalize_score(passed as f64 / total as f64 * 100.0),
            diagnostic: (!missed.is_empty()).then(|| format!("not followed: {}", missed.join(", "))),
        }
    }
}
