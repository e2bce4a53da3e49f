//! YAML configuration documents.
//!
//! Two kinds of files live in an evaluations directory:
//! - `config.yaml`: models to evaluate per provider, plus the judge model
//! - every other `*.yaml`: one evaluation definition, a `run_config`
//!   section and its `evaluation_instances`
//!
//! Instance documents stay untyped here; the evaluation registry parses
//! them once the evaluation type is known.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{EvalError, Result};

/// File name of the run configuration inside an evaluations directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Provider id to model names.
pub type ModelMap = BTreeMap<String, Vec<String>>;

/// Run-wide configuration (`config.yaml`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfiguration {
    pub models: ModelMap,
    /// Judge provider for evaluations that score with a second model
    #[serde(default)]
    pub evaluation_provider: Option<String>,
    #[serde(default)]
    pub evaluation_model: Option<String>,
}

impl RunConfiguration {
    /// Load from `path`. A missing file or missing `models` is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_required(path, "configuration file")?;
        Self::from_yaml(&text)
            .map_err(|e| EvalError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// The `run_config` section of a definition file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfigSection {
    #[serde(alias = "module_name")]
    pub evaluation_type: String,
    #[serde(default)]
    pub class_name: Option<String>,
    /// Replaces the run-wide model map for this evaluation
    #[serde(default)]
    pub models: Option<ModelMap>,
    #[serde(default)]
    pub evaluation_provider: Option<String>,
    #[serde(default)]
    pub evaluation_model: Option<String>,
    /// JSONL or Parquet dataset for dataset-backed evaluation types
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub first_n_instances: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DefinitionDocument {
    run_config: RunConfigSection,
    #[serde(default)]
    evaluation_instances: Vec<Value>,
}

/// One parsed evaluation definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFile {
    pub path: PathBuf,
    pub run_config: RunConfigSection,
    pub evaluation_instances: Vec<Value>,
}

impl EvaluationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_required(path, "definition file")?;
        Self::from_yaml(path, &text)
    }

    pub fn from_yaml(path: &Path, text: &str) -> Result<Self> {
        let doc: DefinitionDocument = serde_yaml::from_str(text)
            .map_err(|e| EvalError::config(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            run_config: doc.run_config,
            evaluation_instances: doc.evaluation_instances,
        })
    }

    pub fn evaluation_type(&self) -> &str {
        &self.run_config.evaluation_type
    }

    /// Models this evaluation runs against.
    pub fn models<'a>(&'a self, run: &'a RunConfiguration) -> &'a ModelMap {
        self.run_config.models.as_ref().unwrap_or(&run.models)
    }

    /// `(provider, model)` of the judge, section override first.
    pub fn judge<'a>(&'a self, run: &'a RunConfiguration) -> Option<(&'a str, &'a str)> {
        let provider = self
            .run_config
            .evaluation_provider
            .as_deref()
            .or(run.evaluation_provider.as_deref())?;
        let model = self
            .run_config
            .evaluation_model
            .as_deref()
            .or(run.evaluation_model.as_deref())?;
        Some((provider, model))
    }
}

/// How definition-file errors are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Log malformed files and continue with the rest
    #[default]
    Lenient,
    /// Abort on the first error
    Strict,
}

/// Load definition files in order.
///
/// A missing file is fatal in both modes.
pub fn load_evaluation_files(paths: &[PathBuf], mode: LoadMode) -> Result<Vec<EvaluationFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let text = read_required(path, "definition file")?;
        match EvaluationFile::from_yaml(path, &text) {
            Ok(file) => {
                debug!(
                    file = %path.display(),
                    evaluation_type = %file.evaluation_type(),
                    instances = file.evaluation_instances.len(),
                    "loaded definition file"
                );
                files.push(file);
            }
            Err(e) if mode == LoadMode::Lenient => {
                warn!(file = %path.display(), error = %e, "skipping malformed definition file");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(files)
}

/// Every `*.yaml` in `dir` except the run configuration, sorted by path.
pub fn discover_definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        EvalError::config(format!("cannot read evaluations directory {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path.extension().is_some_and(|ext| ext == "yaml");
        let is_config = path.file_name().is_some_and(|name| name == CONFIG_FILE_NAME);
        if path.is_file() && is_yaml && !is_config {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_required(path: &Path, what: &str) -> Result<String> {
    if !path.is_file() {
        return Err(EvalError::config(format!("{} not found: {}", what, path.display())));
    }
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    const PATTERN_FILE: &str = r#"
run_config:
  module_name: contains_pattern
  class_name: EvaluationContainsPattern
evaluation_instances:
  - name: capital
    prompt: What is the capital of France?
    pattern: "(?i)paris"
"#;

    #[test]
    fn test_run_configuration() {
        let config = RunConfiguration::from_yaml(
            r#"
models:
  openai_api: [gpt-4o, gpt-4o-mini]
  ollama: [llama3.1:8b]
evaluation_provider: openai_api
evaluation_model: gpt-4o
"#,
        )
        .unwrap();
        assert_eq!(config.models["openai_api"], vec!["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(config.evaluation_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_missing_models_is_configuration_error() {
        let err = RunConfiguration::from_yaml("evaluation_model: gpt-4o\n").unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
        assert!(err.to_string().contains("models"));
    }

    #[test]
    fn test_missing_config_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = RunConfiguration::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_definition_file_accepts_module_name_alias() {
        let file = EvaluationFile::from_yaml(Path::new("pattern.yaml"), PATTERN_FILE).unwrap();
        assert_eq!(file.evaluation_type(), "contains_pattern");
        assert_eq!(file.evaluation_instances.len(), 1);
        assert_eq!(file.evaluation_instances[0]["pattern"], "(?i)paris");
    }

    #[test]
    fn test_section_overrides() {
        let run = RunConfiguration::from_yaml(
            "models:\n  ollama: [llama3.1:8b]\nevaluation_provider: ollama\nevaluation_model: llama3.1:8b\n",
        )
        .unwrap();
        let file = EvaluationFile::from_yaml(
            Path::new("rubric.yaml"),
            r#"
run_config:
  evaluation_type: meets_criteria
  models:
    openai_api: [gpt-4o]
  evaluation_model: qwen2.5:14b
"#,
        )
        .unwrap();
        assert_eq!(file.models(&run).keys().collect::<Vec<_>>(), vec!["openai_api"]);
        assert_eq!(file.judge(&run), Some(("ollama", "qwen2.5:14b")));
    }

    #[test]
    fn test_lenient_skips_malformed_strict_aborts() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "a.yaml", PATTERN_FILE);
        let bad = write(&dir, "b.yaml", "evaluation_instances: []\n");

        let files = load_evaluation_files(&[good.clone(), bad.clone()], LoadMode::Lenient).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, good);

        assert!(load_evaluation_files(&[good, bad], LoadMode::Strict).is_err());
    }

    #[test]
    fn test_missing_definition_file_is_fatal_even_when_lenient() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(load_evaluation_files(&[missing], LoadMode::Lenient).is_err());
    }

    #[test]
    fn test_discover_skips_config_and_other_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE_NAME, "models: {}\n");
        write(&dir, "b.yaml", PATTERN_FILE);
        write(&dir, "a.yaml", PATTERN_FILE);
        write(&dir, "notes.md", "# notes\n");

        let found = discover_definition_files(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yaml"]);
    }
}
