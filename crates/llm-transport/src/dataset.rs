//! Dataset download with an on-disk cache
//!
//! Datasets are JSONL or Parquet files fetched once over HTTP and then
//! served from `<cache_dir>/<url-digest>-<file name>`. The format follows
//! the file extension in the URL.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::Result;

/// Source of dataset rows.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetch every row of the dataset at `url` as a JSON object.
    async fn fetch_rows(&self, url: &str) -> Result<Vec<Value>>;
}

/// On-disk format of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Jsonl,
    Parquet,
}

impl DatasetFormat {
    /// `.parquet` URLs are Parquet, everything else is JSONL.
    pub fn from_url(url: &str) -> Self {
        match url_file_name(url) {
            Some(name) if name.to_ascii_lowercase().ends_with(".parquet") => {
                DatasetFormat::Parquet
            }
            _ => DatasetFormat::Jsonl,
        }
    }
}

/// HTTP dataset source that caches downloads on disk.
pub struct DatasetCache {
    cache_dir: PathBuf,
    http_client: reqwest::Client,
}

impl DatasetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("evalai-llm-transport/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            cache_dir: cache_dir.into(),
            http_client,
        })
    }

    /// Cache under `.evalai/datasets` in the current directory.
    pub fn default_location() -> Result<Self> {
        Self::new(".evalai/datasets")
    }

    /// Path the dataset at `url` is cached under.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(url))
    }

    async fn download(&self, url: &str, path: &Path) -> Result<()> {
        info!(url, "downloading dataset");
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "dataset cached");
        Ok(())
    }
}

/// `<first 12 hex chars of sha256(url)>-<last path segment>`
pub fn cache_file_name(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let file = url_file_name(url).unwrap_or("dataset.jsonl");
    format!("{}-{}", &digest[..12], file)
}

fn url_file_name(url: &str) -> Option<&str> {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|s| !s.is_empty())
}

/// Parse JSONL text, skipping blank lines.
pub fn parse_jsonl(text: &str) -> Result<Vec<Value>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TransportError::from))
        .collect()
}

/// Read every row of a Parquet file. Nested columns (lists, structs)
/// become JSON arrays and objects; null fields are omitted.
pub fn read_parquet(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut rows = Vec::new();
    for batch in reader {
        rows.extend(batch_rows(&batch?)?);
    }
    Ok(rows)
}

fn batch_rows(batch: &RecordBatch) -> Result<Vec<Value>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write(batch)?;
    writer.finish()?;
    Ok(serde_json::from_slice(&writer.into_inner())?)
}

#[async_trait]
impl DatasetSource for DatasetCache {
    async fn fetch_rows(&self, url: &str) -> Result<Vec<Value>> {
        let path = self.cache_path(url);
        if tokio::fs::try_exists(&path).await? {
            debug!(path = %path.display(), "dataset cache hit");
        } else {
            self.download(url, &path).await?;
        }
        match DatasetFormat::from_url(url) {
            DatasetFormat::Jsonl => {
                let text = tokio::fs::read_to_string(&path).await?;
                parse_jsonl(&text)
            }
            DatasetFormat::Parquet => tokio::task::spawn_blocking(move || read_parquet(&path))
                .await
                .map_err(|e| TransportError::Dataset(e.to_string()))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_file_name_keeps_url_file_name() {
        let name = cache_file_name("https://example.com/data/input_data.jsonl?download=true");
        assert!(name.ends_with("-input_data.jsonl"));
        assert_eq!(name.len(), 12 + 1 + "input_data.jsonl".len());
    }

    #[test]
    fn test_cache_file_name_differs_per_url() {
        let a = cache_file_name("https://a.example/x.jsonl");
        let b = cache_file_name("https://b.example/x.jsonl");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_jsonl_skips_blank_lines() {
        let rows = parse_jsonl("{\"key\": 1}\n\n{\"key\": 2}\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["key"], 2);
    }

    #[test]
    fn test_parse_jsonl_rejects_garbage() {
        assert!(parse_jsonl("{not json}").is_err());
    }

    #[tokio::test]
    async fn test_cached_file_is_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        let url = "http://unreachable.invalid/rows.jsonl";
        tokio::fs::write(cache.cache_path(url), "{\"key\": 7}\n")
            .await
            .unwrap();

        let rows = cache.fetch_rows(url).await.unwrap();
        assert_eq!(rows, vec![serde_json::json!({"key": 7})]);
    }

    #[test]
    fn test_format_follows_url_extension() {
        assert_eq!(
            DatasetFormat::from_url("https://hf.example/test-00000-of-00001.parquet?download=true"),
            DatasetFormat::Parquet
        );
        assert_eq!(
            DatasetFormat::from_url("https://hf.example/input_data.jsonl"),
            DatasetFormat::Jsonl
        );
        assert_eq!(DatasetFormat::from_url("https://hf.example/"), DatasetFormat::Jsonl);
    }

    fn write_mmlu_fixture(path: &Path) {
        use std::sync::Arc;

        use arrow::array::{ArrayRef, Int64Array, ListBuilder, StringArray, StringBuilder};
        use parquet::arrow::ArrowWriter;

        let mut options = ListBuilder::new(StringBuilder::new());
        for choices in [["4", "5", "6"], ["Mercury", "Venus", "Mars"]] {
            for choice in choices {
                options.values().append_value(choice);
            }
            options.append(true);
        }
        let columns: Vec<(&str, ArrayRef)> = vec![
            ("question_id", Arc::new(Int64Array::from(vec![70, 71]))),
            (
                "question",
                Arc::new(StringArray::from(vec!["2 + 2 + 1?", "Closest planet to the sun?"])),
            ),
            ("options", Arc::new(options.finish())),
            ("answer", Arc::new(StringArray::from(vec!["B", "A"]))),
            ("category", Arc::new(StringArray::from(vec!["math", "physics"]))),
        ];
        let batch = RecordBatch::try_from_iter(columns)
        .unwrap();

        let mut writer = ArrowWriter::try_new(File::create(path).unwrap(), batch.schema(), None)
            .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_read_parquet_rows_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mmlu.parquet");
        write_mmlu_fixture(&path);

        let rows = read_parquet(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            serde_json::json!({
                "question_id": 70,
                "question": "2 + 2 + 1?",
                "options": ["4", "5", "6"],
                "answer": "B",
                "category": "math",
            })
        );
        assert_eq!(rows[1]["options"][2], "Mars");
    }

    #[tokio::test]
    async fn test_cached_parquet_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path()).unwrap();
        let url = "http://unreachable.invalid/data/test-00000-of-00001.parquet";
        write_mmlu_fixture(&cache.cache_path(url));

        let rows = cache.fetch_rows(url).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["question_id"], 71);
    }

    #[test]
    fn test_read_parquet_rejects_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.parquet");
        std::fs::write(&path, "{\"key\": 1}\n").unwrap();
        assert!(matches!(read_parquet(&path), Err(TransportError::Dataset(_))));
    }
}
