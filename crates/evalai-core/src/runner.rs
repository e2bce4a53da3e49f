//! The evaluation runner.
//!
//! One run moves through `Loaded -> Validated -> Expanded -> Executing -> Done`:
//! - validation resolves every name the run depends on (evaluation types,
//!   providers, judge) and parses every instance; an unresolved name aborts
//!   before a single completion is requested, an invalid instance drops its
//!   evaluation (lenient) or aborts (strict)
//! - expansion builds the work list (evaluation, provider, model, instance),
//!   subtracts the skip set and reports the pending total to progress
//! - execution runs generate, score, persist and advances progress by one,
//!   strictly in expansion order
//!
//! A transport error during generation aborts the run. Records persisted
//! before the abort stay valid.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use eval_store::ResultStore;
use llm_transport::{CompletionTransport, DatasetSource};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::{EvaluationFile, LoadMode, RunConfiguration};
use crate::domain::{EvalError, EvaluationInstance, EvaluationOutput, ExecutionKey, Result};
use crate::identity::{compute_key, filter_pending};
use crate::metrics::METRICS;
use crate::obs;
use crate::progress::ProgressReporter;
use crate::provider::{Provider, ProviderResolver};
use crate::registry::{EvaluationDefinition, EvaluationRegistry, ScorerContext};
use crate::results::ResultStoreAdapter;
use crate::scorer::{ScoreOutcome, Scorer};
use crate::scorers::JudgeHandle;
use crate::validate::{validate_conflicts, validate_params, validate_unique_names};

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Loaded,
    Validated,
    Expanded,
    Executing,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Loaded => "loaded",
            RunPhase::Validated => "validated",
            RunPhase::Expanded => "expanded",
            RunPhase::Executing => "executing",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip work whose key already has an instance record in the store
    pub only_new: bool,
    /// Whether an evaluation with invalid instances is dropped or aborts the run
    pub load_mode: LoadMode,
}

/// Judge model selected for an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeSelection {
    pub provider: Provider,
    pub model: String,
}

/// An evaluation whose instances and names have all been checked.
#[derive(Debug, Clone)]
pub struct ValidatedEvaluation {
    pub source: PathBuf,
    pub definition: EvaluationDefinition,
    /// Providers in configuration order with their models
    pub targets: Vec<(Provider, Vec<String>)>,
    pub judge: Option<JudgeSelection>,
    pub instances: Vec<EvaluationInstance>,
}

impl ValidatedEvaluation {
    pub fn evaluation_type(&self) -> &'static str {
        self.definition.type_key
    }

    /// Number of (provider, model, instance) combinations.
    pub fn candidate_count(&self) -> usize {
        let models: usize = self.targets.iter().map(|(_, models)| models.len()).sum();
        models * self.instances.len()
    }
}

/// Score of one executed instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredInstance {
    pub key: ExecutionKey,
    pub score: f64,
    pub failed: bool,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub evaluations: usize,
    /// Evaluations dropped for invalid instances
    pub rejected_evaluations: usize,
    /// All candidates before the skip set was applied
    pub total: usize,
    pub skipped: usize,
    pub executed: usize,
    pub scoring_failures: usize,
    pub scores: Vec<ScoredInstance>,
}

struct PreparedEvaluation {
    validated: ValidatedEvaluation,
    scorer: Box<dyn Scorer>,
    transports: Vec<(Provider, Arc<dyn CompletionTransport>)>,
}

#[derive(Debug, Clone, Copy)]
struct WorkItem {
    evaluation: usize,
    target: usize,
    model: usize,
    instance: usize,
}

pub struct EvaluationRunner {
    registry: EvaluationRegistry,
    resolver: Arc<ProviderResolver>,
    results: ResultStoreAdapter,
    datasets: Arc<dyn DatasetSource>,
    progress: Arc<dyn ProgressReporter>,
    phase: RunPhase,
}

impl EvaluationRunner {
    pub fn new(
        registry: EvaluationRegistry,
        resolver: Arc<ProviderResolver>,
        store: Arc<dyn ResultStore>,
        datasets: Arc<dyn DatasetSource>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            registry,
            resolver,
            results: ResultStoreAdapter::new(store),
            datasets,
            progress,
            phase: RunPhase::Loaded,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn results(&self) -> &ResultStoreAdapter {
        &self.results
    }

    fn enter_phase(&mut self, run_id: &str, phase: RunPhase) {
        self.phase = phase;
        obs::emit_phase(run_id, phase.as_str());
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check every definition file against the registry and parse its
    /// instances. No transport is constructed.
    ///
    /// Unknown evaluation types, unsupported providers and a missing judge
    /// are fatal in both modes. In [`LoadMode::Lenient`] an evaluation with
    /// an invalid instance is logged and left out of the result.
    pub async fn validate(
        &self,
        config: &RunConfiguration,
        files: &[EvaluationFile],
        mode: LoadMode,
    ) -> Result<Vec<ValidatedEvaluation>> {
        let mut validated = Vec::with_capacity(files.len());
        for file in files {
            if let Some(evaluation) = self.validate_file(config, file, mode).await? {
                validated.push(evaluation);
            }
        }
        Ok(validated)
    }

    async fn validate_file(
        &self,
        config: &RunConfiguration,
        file: &EvaluationFile,
        mode: LoadMode,
    ) -> Result<Option<ValidatedEvaluation>> {
        let source = file.path.display().to_string();
        let context = |message: String| EvalError::config(format!("{source}: {message}"));

        let definition = self
            .registry
            .require(file.evaluation_type())
            .map_err(|e| match e {
                EvalError::Configuration(message) => context(message),
                other => other,
            })?
            .clone();

        let mut targets = Vec::new();
        for (provider, models) in file.models(config) {
            let provider: Provider = provider.parse()?;
            let mut unique: Vec<String> = Vec::with_capacity(models.len());
            for model in models {
                if unique.contains(model) {
                    warn!(file = %source, %provider, %model, "model listed twice, running it once");
                } else {
                    unique.push(model.clone());
                }
            }
            targets.push((provider, unique));
        }

        let judge = if definition.requires_judge {
            let (provider, model) = file.judge(config).ok_or_else(|| {
                context(format!(
                    "{} requires evaluation_provider and evaluation_model",
                    definition.type_key
                ))
            })?;
            Some(JudgeSelection {
                provider: provider.parse()?,
                model: model.to_string(),
            })
        } else {
            None
        };

        let instances = match self.collect_instances(&definition, file, &context).await {
            Ok(instances) => instances,
            Err(EvalError::Configuration(message)) if mode == LoadMode::Lenient => {
                warn!(file = %source, error = %message, "skipping evaluation with invalid instances");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if instances.is_empty() {
            warn!(file = %source, "evaluation has no instances");
        }

        debug!(
            file = %source,
            evaluation_type = definition.type_key,
            instances = instances.len(),
            "evaluation validated"
        );
        Ok(Some(ValidatedEvaluation {
            source: file.path.clone(),
            definition,
            targets,
            judge,
            instances,
        }))
    }

    /// Inline instances followed by dataset rows, all parsed and checked.
    async fn collect_instances(
        &self,
        definition: &EvaluationDefinition,
        file: &EvaluationFile,
        context: &(dyn Fn(String) -> EvalError + Sync),
    ) -> Result<Vec<EvaluationInstance>> {
        let mut instances = Vec::new();
        for (i, document) in file.evaluation_instances.iter().enumerate() {
            let instance = (definition.parse_instance)(document.clone())
                .map_err(|e| context(format!("instance #{}: {}", i + 1, e)))?;
            validate_params(&instance)
                .and_then(|_| validate_conflicts(&instance))
                .map_err(|e| context(format!("instance '{}': {}", instance.name, e)))?;
            instances.push(instance);
        }

        match (&file.run_config.data_url, definition.dataset_row) {
            (Some(url), Some(_)) => {
                let rows = self.datasets.fetch_rows(url).await?;
                instances.extend(self.dataset_instances(definition, file, rows, context)?);
            }
            (Some(_), None) => {
                return Err(context(format!(
                    "{} does not take a data_url",
                    definition.type_key
                )));
            }
            (None, _) => {}
        }

        validate_unique_names(&instances).map_err(context)?;
        Ok(instances)
    }

    fn dataset_instances(
        &self,
        definition: &EvaluationDefinition,
        file: &EvaluationFile,
        rows: Vec<Value>,
        context: &(dyn Fn(String) -> EvalError + Sync),
    ) -> Result<Vec<EvaluationInstance>> {
        let Some(to_document) = definition.dataset_row else {
            return Ok(Vec::new());
        };

        let mut instances = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let document = to_document(row)
                .ok_or_else(|| context(format!("dataset row #{} is missing required fields", i + 1)))?;
            let instance = (definition.parse_instance)(document)
                .map_err(|e| context(format!("dataset row #{}: {}", i + 1, e)))?;
            validate_params(&instance)
                .map_err(|e| context(format!("dataset instance '{}': {}", instance.name, e)))?;
            if let Err(e) = validate_conflicts(&instance) {
                warn!(instance = %instance.name, "dataset instance: {}", e);
            }
            instances.push(instance);
        }

        if definition.sort_by_name {
            instances.sort_by(|a, b| compare_names(&a.name, &b.name));
        }
        if let Some(n) = file.run_config.first_n_instances {
            instances.truncate(n);
        }
        Ok(instances)
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    fn prepare(&self, validated: Vec<ValidatedEvaluation>) -> Result<Vec<PreparedEvaluation>> {
        let mut prepared = Vec::with_capacity(validated.len());
        for evaluation in validated {
            let judge = match &evaluation.judge {
                Some(selection) => Some(JudgeHandle {
                    transport: self.resolver.resolve_provider(selection.provider)?,
                    provider: selection.provider.to_string(),
                    model: selection.model.clone(),
                }),
                None => None,
            };
            let scorer = (evaluation.definition.build)(ScorerContext { judge })?;

            let mut transports = Vec::with_capacity(evaluation.targets.len());
            for (provider, _) in &evaluation.targets {
                transports.push((*provider, self.resolver.resolve_provider(*provider)?));
            }
            prepared.push(PreparedEvaluation {
                validated: evaluation,
                scorer,
                transports,
            });
        }
        Ok(prepared)
    }

    fn key_of(prepared: &[PreparedEvaluation], item: &WorkItem) -> ExecutionKey {
        let evaluation = &prepared[item.evaluation].validated;
        let (provider, models) = &evaluation.targets[item.target];
        compute_key(
            evaluation.evaluation_type(),
            &models[item.model],
            provider.as_str(),
            &evaluation.instances[item.instance].name,
        )
    }

    fn expand(prepared: &[PreparedEvaluation]) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for (e, evaluation) in prepared.iter().enumerate() {
            for (t, (_, models)) in evaluation.validated.targets.iter().enumerate() {
                for m in 0..models.len() {
                    for i in 0..evaluation.validated.instances.len() {
                        items.push(WorkItem {
                            evaluation: e,
                            target: t,
                            model: m,
                            instance: i,
                        });
                    }
                }
            }
        }
        items
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    /// Validate, expand and execute every evaluation in `files`.
    pub async fn run(
        &mut self,
        config: &RunConfiguration,
        files: &[EvaluationFile],
        options: RunOptions,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        let started = Instant::now();
        self.phase = RunPhase::Loaded;

        let result = self
            .run_phases(&run_id, config, files, options)
            .instrument(span.clone())
            .await;
        let _entered = span.enter();
        let duration_ms = started.elapsed().as_millis() as u64;
        METRICS.flush();
        match &result {
            Ok(report) => obs::emit_run_finished(&run_id, duration_ms, report.executed, true),
            Err(e) => {
                warn!(error = %e, phase = %self.phase, "run aborted");
                obs::emit_run_finished(&run_id, duration_ms, 0, false);
            }
        }
        result
    }

    async fn run_phases(
        &mut self,
        run_id: &str,
        config: &RunConfiguration,
        files: &[EvaluationFile],
        options: RunOptions,
    ) -> Result<RunReport> {
        let validated = self.validate(config, files, options.load_mode).await?;
        let rejected_evaluations = files.len() - validated.len();
        self.enter_phase(run_id, RunPhase::Validated);

        let prepared = self.prepare(validated)?;
        let candidates = Self::expand(&prepared);
        let total = candidates.len();
        let completed = if options.only_new {
            self.results.completed_keys().await?
        } else {
            HashSet::new()
        };
        let pending = filter_pending(candidates, &completed, |item| Self::key_of(&prepared, item));
        let skipped = total - pending.len();
        METRICS.add_skipped(skipped as u64);
        obs::emit_run_started(run_id, prepared.len(), pending.len(), skipped);
        self.progress.start(pending.len() as u64);
        self.enter_phase(run_id, RunPhase::Expanded);

        self.enter_phase(run_id, RunPhase::Executing);
        let mut scores = Vec::with_capacity(pending.len());
        let mut scoring_failures = 0;
        for item in &pending {
            match self.execute(&prepared, item).await {
                Ok(scored) => {
                    scoring_failures += usize::from(scored.failed);
                    scores.push(scored);
                    self.progress.advance(1);
                }
                Err(e) => {
                    self.progress.finish();
                    return Err(e);
                }
            }
        }
        self.progress.finish();
        self.enter_phase(run_id, RunPhase::Done);

        info!(
            executed = scores.len(),
            skipped,
            rejected_evaluations,
            scoring_failures,
            "run complete"
        );
        Ok(RunReport {
            run_id: run_id.to_string(),
            evaluations: prepared.len(),
            rejected_evaluations,
            total,
            skipped,
            executed: scores.len(),
            scoring_failures,
            scores,
        })
    }

    async fn execute(&self, prepared: &[PreparedEvaluation], item: &WorkItem) -> Result<ScoredInstance> {
        let evaluation = &prepared[item.evaluation];
        let validated = &evaluation.validated;
        let (provider, transport) = &evaluation.transports[item.target];
        let model = &validated.targets[item.target].1[item.model];
        let instance = &validated.instances[item.instance];
        let key = Self::key_of(prepared, item);

        debug!(key = %key, "executing instance");
        let raw = evaluation
            .scorer
            .generate(instance, model, transport.as_ref())
            .await?;
        let outcome = evaluation.scorer.score(&raw, instance).await;

        let failed = outcome.is_failed();
        if let ScoreOutcome::Failed { diagnostic } = &outcome {
            METRICS.inc_scoring_failures();
            obs::emit_scoring_failed(&key, diagnostic);
        }
        let score = outcome.score();

        let output = EvaluationOutput {
            evaluation_type: validated.evaluation_type().to_string(),
            output_class: validated.definition.output_class.to_string(),
            model: model.clone(),
            provider: provider.as_str().to_string(),
            score,
            instance: instance.clone(),
            message: raw.first().unwrap_or_default().to_string(),
            prompt_tokens_total: raw.prompt_tokens_total,
            completion_tokens_total: raw.completion_tokens_total,
            duration_sec_total: raw.duration_sec_total,
            execution_date: Utc::now(),
            diagnostic: outcome.diagnostic().map(str::to_string),
        };
        self.results.persist(output).await?;
        METRICS.inc_executed();
        obs::emit_instance_scored(&key, score);

        Ok(ScoredInstance { key, score, failed })
    }
}

/// Numeric names in numeric order, then everything else lexically.
fn compare_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_names() {
        let mut names = vec!["1001", "999", "b", "a", "1000"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["999", "1000", "1001", "a", "b"]);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(RunPhase::Executing.to_string(), "executing");
        assert_eq!(serde_json::to_value(RunPhase::Done).unwrap(), "done");
    }
}
