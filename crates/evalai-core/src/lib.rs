//! EvalAI Core Library
//!
//! Runs LLM evaluation suites: definition files are validated against the
//! evaluation registry, expanded into (evaluation, provider, model,
//! instance) work, executed through provider transports and scored, with
//! every result persisted to a result store.

pub mod config;
pub mod domain;
pub mod identity;
pub mod ifeval;
pub mod metrics;
pub mod obs;
pub mod progress;
pub mod provider;
pub mod registry;
pub mod results;
pub mod runner;
pub mod scorer;
pub mod scorers;
pub mod telemetry;
pub mod text;
pub mod validate;

/// Crate version, stamped into the CLI `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{
    discover_definition_files, load_evaluation_files, EvaluationFile, LoadMode, ModelMap,
    RunConfigSection, RunConfiguration, CONFIG_FILE_NAME,
};

pub use domain::{
    normalize_score, EvalError, EvaluationInstance, EvaluationOutput, ExecutionKey,
    InstanceParams, Result,
};

pub use identity::{compute_key, filter_pending, key_of_record, load_completed_keys};

pub use progress::{LogProgress, ProgressReporter, RecordingProgress};

pub use provider::{Provider, ProviderResolver};

pub use registry::{EvaluationDefinition, EvaluationRegistry, ScorerContext};

pub use results::{model_averages, ModelAverage, ResultStoreAdapter};

pub use runner::{
    EvaluationRunner, JudgeSelection, RunOptions, RunPhase, RunReport, ScoredInstance,
    ValidatedEvaluation,
};

pub use scorer::{RawResult, ScoreOutcome, Scorer};

pub use telemetry::{init_tracing, LogFormat};
