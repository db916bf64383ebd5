//! rtrack fetch: [`DatasetFetcher`] implementations.
//!
//! [`DirFetcher`] serves `<root>/<name>.json` or `<root>/<name>.csv`; CSV rows
//! become JSON objects of strings. [`MemoryFetcher`] serves fixed payloads.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use rtrack_store::DatasetFetcher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

static DATASET_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("dataset name regex"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("dataset not found: {0}")]
    NotFound(String),
    #[error("invalid dataset name: {0:?}")]
    InvalidName(String),
    #[error("read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parse {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("parse {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    fn ext(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }
}

/// A dataset file found under a data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetFile {
    pub name: String,
    pub format: Format,
    pub bytes: u64,
}

/// Reads datasets from a directory.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// Locate the file for `name`; JSON takes precedence over CSV.
    pub async fn locate(&self, name: &str) -> Result<(PathBuf, Format), FetchError> {
        if !DATASET_NAME.is_match(name) {
            return Err(FetchError::InvalidName(name.to_string()));
        }
        for format in [Format::Json, Format::Csv] {
            let path = self.root.join(format!("{}.{}", name, format.ext()));
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok((path, format));
            }
        }
        Err(FetchError::NotFound(name.to_string()))
    }

    pub async fn load(&self, name: &str) -> Result<Value, FetchError> {
        let (path, format) = self.locate(name).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| FetchError::Io { path: path.clone(), source })?;
        debug!(dataset = %name, path = %path.display(), bytes = bytes.len(), "fetch: read");
        match format {
            Format::Json => serde_json::from_slice(&bytes).map_err(|source| FetchError::Json { path, source }),
            Format::Csv => csv_rows(&bytes).map_err(|source| FetchError::Csv { path, source }),
        }
    }
}

#[async_trait::async_trait]
impl DatasetFetcher for DirFetcher {
    async fn request(&self, name: &str) -> anyhow::Result<Value> { Ok(self.load(name).await?) }
}

/// Parse CSV with a header row into an array of string-valued objects.
pub fn csv_rows(bytes: &[u8]) -> Result<Value, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut obj = Map::with_capacity(headers.len());
        for (h, v) in headers.iter().zip(record.iter()) {
            obj.insert(h.to_string(), Value::String(v.to_string()));
        }
        rows.push(Value::Object(obj));
    }
    Ok(Value::Array(rows))
}

/// List datasets available under `root`, sorted by name. JSON wins over CSV for the same name.
pub async fn discover(root: &Path) -> Result<Vec<DatasetFile>, FetchError> {
    let io = |source: std::io::Error| FetchError::Io { path: root.to_path_buf(), source };
    let mut dir = tokio::fs::read_dir(root).await.map_err(io)?;
    let mut found: BTreeMap<String, DatasetFile> = BTreeMap::new();
    while let Some(entry) = dir.next_entry().await.map_err(io)? {
        let path = entry.path();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Format::Json,
            Some("csv") => Format::Csv,
            _ => continue,
        };
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        if !DATASET_NAME.is_match(name) {
            continue;
        }
        let bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
        let file = DatasetFile { name: name.to_string(), format, bytes };
        match found.get(name) {
            Some(prev) if prev.format == Format::Json => {}
            _ => {
                found.insert(name.to_string(), file);
            }
        }
    }
    info!(root = %root.display(), datasets = found.len(), "fetch: discovered");
    Ok(found.into_values().collect())
}

/// Serves fixed payloads; names listed as failing return an error.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    payloads: BTreeMap<String, Value>,
    failing: BTreeMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, name: &str, payload: Value) -> Self { self.payloads.insert(name.to_string(), payload); self }

    pub fn failing(mut self, name: &str, reason: &str) -> Self { self.failing.insert(name.to_string(), reason.to_string()); self }

    /// Names requested so far, in order.
    pub fn requests(&self) -> Vec<String> { self.requests.lock().map(|r| r.clone()).unwrap_or_default() }
}

#[async_trait::async_trait]
impl DatasetFetcher for MemoryFetcher {
    async fn request(&self, name: &str) -> anyhow::Result<Value> {
        if let Ok(mut r) = self.requests.lock() { r.push(name.to_string()); }
        if let Some(reason) = self.failing.get(name) {
            anyhow::bail!("{}: {}", name, reason);
        }
        self.payloads.get(name).cloned().ok_or_else(|| FetchError::NotFound(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_are_string_objects() {
        let v = csv_rows(b"country_code,year, mean\nUSA,2018, 7.1\nCAN,2018,\n").unwrap();
        assert_eq!(v[0]["country_code"], "USA");
        assert_eq!(v[0]["mean"], "7.1");
        assert_eq!(v[1]["mean"], "");
        assert_eq!(v.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn dataset_names_are_restricted() {
        assert!(DATASET_NAME.is_match("esrIndicatorScores"));
        assert!(DATASET_NAME.is_match("at-risk_2"));
        assert!(!DATASET_NAME.is_match("../etc/passwd"));
        assert!(!DATASET_NAME.is_match(""));
    }
}
