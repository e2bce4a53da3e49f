//! `mmlu_pro`: extract a single answer letter from step-by-step reasoning.
//!
//! Extraction tries three patterns in fixed priority order and the first
//! hit wins:
//! 1. `answer is (X)`, parentheses optional
//! 2. `Answer: X`
//! 3. the last isolated letter `A`-`J` in the text
//!
//! Thinking blocks are stripped first since they often mention distractor
//! letters.

use std::sync::OnceLock;

use async_trait::async_trait;
use llm_transport::{ChatMessage, CompletionRequest, CompletionTransport};
use regex::Regex;

use super::{params_mismatch, response_text};
use crate::domain::{EvaluationInstance, InstanceParams, MultipleChoiceParams, Result, CHOICE_LETTERS};
use crate::scorer::{generate_once, RawResult, ScoreOutcome, Scorer};
use crate::text::strip_thinking;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 4000;

struct Extractors {
    answer_is: Regex,
    answer_colon: Regex,
    bare_letter: Regex,
}

fn extractors() -> &'static Extractors {
    static RE: OnceLock<Extractors> = OnceLock::new();
    RE.get_or_init(|| Extractors {
        answer_is: Regex::new(r"answer is \(?([A-J])\)?").expect("static regex"),
        answer_colon: Regex::new(r".*[aA]nswer:\s*([A-J])").expect("static regex"),
        bare_letter: Regex::new(r"\b[A-J]\b").expect("static regex"),
    })
}

/// Extract the chosen letter from `text`, or `None` if nothing resolves.
pub fn extract_choice(text: &str) -> Option<String> {
    let re = extractors();
    if let Some(caps) = re.answer_is.captures(text) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = re.answer_colon.captures(text) {
        return Some(caps[1].to_string());
    }
    re.bare_letter
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_string())
}

/// Build the benchmark prompt: category header, question, lettered options.
pub fn build_prompt(params: &MultipleChoiceParams) -> String {
    let mut prompt = format!(
        "The following are multiple choice questions (with answers) about {}. Think step by \
         step and then output the answer in the format of \"The answer is (X)\" at the end.\n\n",
        params.category
    );
    prompt.push_str(&format!("Question: {}\nOptions:\n", params.question));
    for (letter, option) in CHOICE_LETTERS.chars().zip(&params.options) {
        prompt.push_str(&format!("{letter}. {option}\n"));
    }
    prompt.push_str("\nAnswer: Let's think step by step.\n");
    prompt
}

/// Binary multiple-choice scorer.
#[derive(Debug, Default)]
pub struct MultipleChoiceScorer;

impl MultipleChoiceScorer {
    fn params<'a>(&self, instance: &'a EvaluationInstance) -> Option<&'a MultipleChoiceParams> {
        match &instance.params {
            InstanceParams::MultipleChoice(p) => Some(p),
            _ => None,
        }
    }
}

#[async_trait]
impl Scorer for MultipleChoiceScorer {
    async fn generate(
        &self,
        instance: &EvaluationInstance,
        model: &str,
        transport: &dyn CompletionTransport,
    ) -> Result<RawResult> {
        let params = self
            .params(instance)
            .ok_or_else(|| params_mismatch("multiple_choice", instance))?;

        let request = CompletionRequest::new(model, vec![ChatMessage::user(build_prompt(params))])
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        generate_once(transport, request).await
    }

    async fn score(&self, raw: &RawResult, instance: &EvaluationInstance) -> ScoreOutcome {
        let Some(params) = self.params(instance) else {
            return ScoreOutcome::failed(params_mismatch("multiple_choice", instance).to_string());
        };
        let text = match response_text(raw) {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };

        let cleaned = strip_thinking(text).replace("**", "");
        match extract_choice(&cleaned) {
            Some(letter) => ScoreOutcome::binary_with(
                letter == params.answer.trim(),
                format!("extracted {letter}, expected {}", params.answer.trim()),
            ),
            None => ScoreOutcome::binary_with(false, "no answer letter found"),
        }
    }
}
