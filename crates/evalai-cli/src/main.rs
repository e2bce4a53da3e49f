//! EvalAI - LLM evaluation harness CLI
//!
//! The `evalai` command runs evaluation suites against configured models and
//! inspects the stored results.
//!
//! ## Commands
//!
//! - `run`: Validate, expand and execute every evaluation in a directory
//! - `check`: Validate definition files without requesting any completion
//! - `results`: List stored results, optionally latest-only or averaged
//! - `remove`: Delete one stored result by record id

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use eval_store::{
    OutputQuery, OutputRecord, OutputType, ResultStore, StoreTarget, SurrealResultStore,
};
use evalai_core::{
    discover_definition_files, load_evaluation_files, model_averages, EvaluationFile,
    EvaluationRegistry, EvaluationRunner, LoadMode, LogFormat, LogProgress, ProviderResolver,
    ResultStoreAdapter, RunConfiguration, RunOptions, RunReport, CONFIG_FILE_NAME,
};
use llm_transport::{DatasetCache, DatasetSource};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "evalai")]
#[command(author = "Stevedores Org")]
#[command(version = evalai_core::VERSION)]
#[command(about = "Evaluation harness for LLM outputs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Result store URL (`mem://`, `surrealkv://path`, `ws://host:port`)
    #[arg(long, global = true, env = "EVALAI_DB")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct Selection {
    /// Directory holding config.yaml and the definition files
    #[arg(short, long, default_value = "data/evaluations")]
    dir: PathBuf,

    /// Run configuration (default: <dir>/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Definition files to use instead of every *.yaml in <dir>
    #[arg(short, long, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Abort on the first malformed definition file instead of skipping it
    #[arg(long)]
    strict: bool,
}

impl Selection {
    fn load_mode(&self) -> LoadMode {
        if self.strict {
            LoadMode::Strict
        } else {
            LoadMode::Lenient
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every selected evaluation against every configured model
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Skip work that already has a stored result
        #[arg(long)]
        only_new: bool,
    },

    /// Validate definition files without calling any model
    Check {
        #[command(flatten)]
        selection: Selection,
    },

    /// Show stored results
    Results {
        /// Filter by record kind
        #[arg(long, value_parser = parse_output_type)]
        output_type: Option<OutputType>,

        /// Filter by evaluation type
        #[arg(long)]
        module: Option<String>,

        /// Filter by model name
        #[arg(long)]
        model: Option<String>,

        /// Filter by provider id
        #[arg(long)]
        provider: Option<String>,

        /// Keep only the most recent result per evaluation, instance and model
        #[arg(long)]
        latest: bool,

        /// Print per-model averages over the latest results instead
        #[arg(long)]
        averages: bool,

        /// Print one JSON object per line
        #[arg(long)]
        jsonl: bool,
    },

    /// Remove a stored result
    Remove {
        /// Record id to remove
        record_id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    evalai_core::init_tracing(format, level);

    let target = match &cli.db {
        Some(url) => StoreTarget::Url(url.clone()),
        None => StoreTarget::from_env(),
    };

    match cli.command {
        Commands::Run {
            selection,
            only_new,
        } => {
            let store = open_store(&target).await?;
            let datasets = open_datasets()?;
            let report = cmd_run(
                &selection,
                RunOptions {
                    only_new,
                    ..RunOptions::default()
                },
                Arc::new(ProviderResolver::from_env()),
                store,
                datasets,
            )
            .await?;
            print_report(&report);
            Ok(())
        }
        Commands::Check { selection } => cmd_check(&selection, open_datasets()?).await,
        Commands::Results {
            output_type,
            module,
            model,
            provider,
            latest,
            averages,
            jsonl,
        } => {
            let results = ResultStoreAdapter::new(open_store(&target).await?);
            let mut query = OutputQuery::new();
            if let Some(output_type) = output_type {
                query = query.with_output_type(output_type);
            }
            if let Some(module) = module {
                query = query.with_module(module);
            }
            if let Some(model) = model {
                query = query.with_model(model);
            }
            if let Some(provider) = provider {
                query = query.with_provider(provider);
            }
            let lines = cmd_results(&results, &query, latest, averages, jsonl).await?;
            for line in lines {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Remove { record_id, yes } => {
            let results = ResultStoreAdapter::new(open_store(&target).await?);
            let stdin = io::stdin();
            cmd_remove(&results, &record_id, yes, &mut stdin.lock()).await
        }
    }
}

fn parse_output_type(value: &str) -> std::result::Result<OutputType, String> {
    match value {
        "instance" => Ok(OutputType::Instance),
        "overall" => Ok(OutputType::Overall),
        other => Err(format!("expected 'instance' or 'overall', got '{}'", other)),
    }
}

async fn open_store(target: &StoreTarget) -> Result<Arc<dyn ResultStore>> {
    let store = SurrealResultStore::open(target)
        .await
        .with_context(|| format!("Failed to open result store at {}", target.describe()))?;
    Ok(Arc::new(store))
}

fn open_datasets() -> Result<Arc<dyn DatasetSource>> {
    let cache = DatasetCache::default_location().context("Failed to set up dataset cache")?;
    Ok(Arc::new(cache))
}

/// Load the run configuration and definition files named by `selection`.
fn load_selection(
    selection: &Selection,
    mode: LoadMode,
) -> Result<(RunConfiguration, Vec<EvaluationFile>)> {
    let config_path = selection
        .config
        .clone()
        .unwrap_or_else(|| selection.dir.join(CONFIG_FILE_NAME));
    let config = RunConfiguration::load(&config_path)?;

    let paths = if selection.files.is_empty() {
        discover_definition_files(&selection.dir)?
    } else {
        selection.files.clone()
    };
    let files = load_evaluation_files(&paths, mode)?;
    if files.is_empty() {
        bail!("No evaluation definitions found in {}", describe_paths(&selection.dir, &paths));
    }
    Ok((config, files))
}

fn describe_paths(dir: &Path, paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        dir.display().to_string()
    } else {
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Run the selected evaluations. `--strict` applies to both file loading
/// and instance validation.
async fn cmd_run(
    selection: &Selection,
    options: RunOptions,
    resolver: Arc<ProviderResolver>,
    store: Arc<dyn ResultStore>,
    datasets: Arc<dyn DatasetSource>,
) -> Result<RunReport> {
    let options = RunOptions {
        load_mode: selection.load_mode(),
        ..options
    };
    let (config, files) = load_selection(selection, options.load_mode)?;
    let mut runner = EvaluationRunner::new(
        EvaluationRegistry::builtin(),
        resolver,
        store,
        datasets,
        Arc::new(LogProgress::new()),
    );
    let report = runner
        .run(&config, &files, options)
        .await
        .context("Evaluation run failed")?;
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!("Run {}", report.run_id);
    println!("Evaluations:      {}", report.evaluations);
    println!("Rejected:         {}", report.rejected_evaluations);
    println!("Candidates:       {}", report.total);
    println!("Skipped:          {}", report.skipped);
    println!("Executed:         {}", report.executed);
    println!("Scoring failures: {}", report.scoring_failures);
}

/// Validate the selected definitions. Always strict; no transport is
/// constructed.
async fn cmd_check(selection: &Selection, datasets: Arc<dyn DatasetSource>) -> Result<()> {
    let (config, files) = load_selection(selection, LoadMode::Strict)?;
    let runner = EvaluationRunner::new(
        EvaluationRegistry::builtin(),
        Arc::new(ProviderResolver::empty()),
        Arc::new(eval_store::MemoryResultStore::new()),
        datasets,
        Arc::new(LogProgress::new()),
    );
    let validated = runner.validate(&config, &files, LoadMode::Strict).await?;

    let mut candidates = 0;
    for evaluation in &validated {
        candidates += evaluation.candidate_count();
        println!(
            "{:<24} {:>6} instances  {}",
            evaluation.evaluation_type(),
            evaluation.instances.len(),
            evaluation.source.display()
        );
    }
    info!(evaluations = validated.len(), candidates, "definitions valid");
    println!(
        "{} evaluations valid, {} executions per full run",
        validated.len(),
        candidates
    );
    Ok(())
}

/// Render stored results as output lines.
async fn cmd_results(
    results: &ResultStoreAdapter,
    query: &OutputQuery,
    latest: bool,
    averages: bool,
    jsonl: bool,
) -> Result<Vec<String>> {
    if averages {
        let records = results.latest_results(query).await?;
        let mut lines = Vec::new();
        for average in model_averages(&records) {
            if jsonl {
                lines.push(serde_json::to_string(&average)?);
            } else {
                lines.push(format!(
                    "{:<14} {:<28} {:>5} results  avg {:>6.2}",
                    average.provider, average.model, average.evaluations, average.average
                ));
            }
        }
        return Ok(lines);
    }

    let records = if latest {
        results.latest_results(query).await?
    } else {
        results.query(query).await?
    };
    let mut lines = Vec::with_capacity(records.len());
    for record in &records {
        if jsonl {
            lines.push(serde_json::to_string(record)?);
        } else {
            lines.push(format_record(record));
        }
    }
    Ok(lines)
}

fn format_record(record: &OutputRecord) -> String {
    format!(
        "{}  {}  {:<22} {}.{:<24} {:<16} {:>6.2}",
        record.record_id,
        record.execution_date.format("%Y-%m-%d %H:%M"),
        record.module_name,
        record.provider,
        record.name_model,
        record.instance_name().unwrap_or("-"),
        record.score
    )
}

/// Remove one record, asking first unless `yes` is set.
async fn cmd_remove(
    results: &ResultStoreAdapter,
    record_id: &str,
    yes: bool,
    input: &mut impl BufRead,
) -> Result<()> {
    let record = results
        .all()
        .await?
        .into_iter()
        .find(|r| r.record_id.as_str() == record_id)
        .with_context(|| format!("No result with record id {}", record_id))?;

    if !yes {
        println!("{}", format_record(&record));
        print!("Remove this result? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Kept {}", record_id);
            return Ok(());
        }
    }

    results.remove(record_id).await?;
    println!("Removed {}", record_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eval_store::{MemoryResultStore, RecordId};
    use evalai_core::Provider;
    use llm_transport::fakes::{ScriptedTransport, StaticDataset};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str, model: &str, instance: &str, score: f64, minute: u32) -> OutputRecord {
        OutputRecord {
            record_id: RecordId(id.to_string()),
            output_type: OutputType::Instance,
            module_name: "contains_pattern".to_string(),
            class_name: "EvaluationContainsPatternOutput".to_string(),
            name_model: model.to_string(),
            provider: "ollama".to_string(),
            score,
            execution_date: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
            evaluation_instance: json!({"name": instance}),
            message: String::new(),
            prompt_tokens_total: 0,
            completion_tokens_total: 0,
            duration_sec_total: 0.0,
            diagnostic: None,
        }
    }

    fn adapter(records: Vec<OutputRecord>) -> (Arc<MemoryResultStore>, ResultStoreAdapter) {
        let store = Arc::new(MemoryResultStore::with_records(records));
        (store.clone(), ResultStoreAdapter::new(store))
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "evalai",
            "--verbose",
            "run",
            "--dir",
            "suites",
            "--only-new",
            "--files",
            "a.yaml",
            "b.yaml",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                selection,
                only_new,
            } => {
                assert!(only_new);
                assert_eq!(selection.dir, PathBuf::from("suites"));
                assert_eq!(selection.files.len(), 2);
                assert!(!selection.strict);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parses_output_type() {
        let cli = Cli::try_parse_from(["evalai", "results", "--output-type", "overall"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Results {
                output_type: Some(OutputType::Overall),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["evalai", "results", "--output-type", "summary"]).is_err());
    }

    #[test]
    fn test_cli_parses_remove() {
        let cli = Cli::try_parse_from(["evalai", "remove", "abc", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Remove { ref record_id, yes: true } if record_id == "abc"));
    }

    #[tokio::test]
    async fn test_cmd_run_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "models:\n  ollama: [llama3.1:8b]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("pattern.yaml"),
            "run_config:\n  evaluation_type: contains_pattern\nevaluation_instances:\n  - name: capital\n    prompt: Capital of France?\n    pattern: \"(?i)paris\"\n",
        )
        .unwrap();

        let selection = Selection {
            dir: dir.path().to_path_buf(),
            config: None,
            files: vec![],
            strict: true,
        };
        let resolver = ProviderResolver::empty()
            .register(Provider::Ollama, Arc::new(ScriptedTransport::always("Paris")));
        let store = Arc::new(MemoryResultStore::new());

        let report = cmd_run(
            &selection,
            RunOptions::default(),
            Arc::new(resolver),
            store.clone(),
            Arc::new(StaticDataset::new()),
        )
        .await
        .unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_cmd_run_strict_flag_rejects_invalid_instances() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "models:\n  ollama: [llama3.1:8b]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("good.yaml"),
            "run_config:\n  evaluation_type: contains_pattern\nevaluation_instances:\n  - name: capital\n    prompt: Capital of France?\n    pattern: \"(?i)paris\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("bad.yaml"),
            "run_config:\n  evaluation_type: contains_pattern\nevaluation_instances:\n  - name: capital\n    prompt: Capital of France?\n",
        )
        .unwrap();

        let run = |strict: bool| {
            let selection = Selection {
                dir: dir.path().to_path_buf(),
                config: None,
                files: vec![],
                strict,
            };
            let resolver = ProviderResolver::empty()
                .register(Provider::Ollama, Arc::new(ScriptedTransport::always("Paris")));
            async move {
                cmd_run(
                    &selection,
                    RunOptions::default(),
                    Arc::new(resolver),
                    Arc::new(MemoryResultStore::new()),
                    Arc::new(StaticDataset::new()),
                )
                .await
            }
        };

        let report = run(false).await.unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(report.rejected_evaluations, 1);
        assert!(run(true).await.is_err());
    }

    #[tokio::test]
    async fn test_cmd_run_empty_directory_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "models: {}\n").unwrap();
        let selection = Selection {
            dir: dir.path().to_path_buf(),
            config: None,
            files: vec![],
            strict: false,
        };
        let result = cmd_run(
            &selection,
            RunOptions::default(),
            Arc::new(ProviderResolver::empty()),
            Arc::new(MemoryResultStore::new()),
            Arc::new(StaticDataset::new()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cmd_results_latest_and_averages() {
        let (_, results) = adapter(vec![
            record("r1", "llama3.1:8b", "capital", 0.0, 1),
            record("r2", "llama3.1:8b", "capital", 100.0, 2),
            record("r3", "llama3.1:8b", "river", 50.0, 3),
        ]);
        let query = OutputQuery::new();

        let all = cmd_results(&results, &query, false, false, false).await.unwrap();
        assert_eq!(all.len(), 3);

        let latest = cmd_results(&results, &query, true, false, true).await.unwrap();
        assert_eq!(latest.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&latest[0]).unwrap();
        assert_eq!(first["record_id"], "r2");

        let averages = cmd_results(&results, &query, false, true, true).await.unwrap();
        assert_eq!(averages.len(), 1);
        let average: serde_json::Value = serde_json::from_str(&averages[0]).unwrap();
        assert_eq!(average["average"], 75.0);
    }

    #[tokio::test]
    async fn test_cmd_remove_asks_for_confirmation() {
        let (store, results) = adapter(vec![record("r1", "m", "capital", 100.0, 1)]);

        cmd_remove(&results, "r1", false, &mut &b"n\n"[..]).await.unwrap();
        assert_eq!(store.len(), 1);

        cmd_remove(&results, "r1", false, &mut &b"y\n"[..]).await.unwrap();
        assert!(store.is_empty());

        assert!(cmd_remove(&results, "r1", true, &mut &b""[..]).await.is_err());
    }
}
