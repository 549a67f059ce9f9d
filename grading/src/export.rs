//! Result persistence: pretty JSON, flat CSV and timestamped snapshots.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::results::{BenchmarkResults, ResultsDocument};
use crate::types::Clue;

/// Errors from writing or reading result files
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

const CSV_HEADER: [&str; 12] = [
    "model",
    "clueId",
    "clue",
    "expected",
    "answer",
    "pass",
    "score",
    "raw",
    "tokens",
    "cost",
    "promptTokens",
    "completionTokens",
];

/// Output format, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// `.csv` (any case) selects CSV; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_dir_for_file(path: &Path) -> ExportResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            fs::create_dir_all(dir).map_err(|source| ExportError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write results (typed or a raw document) as pretty-printed JSON.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, results: &T) -> ExportResult<()> {
    let json = serde_json::to_string_pretty(results).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_file(path, &json)
}

/// Write results as CSV, one row per (model, clue).
pub fn save_csv(path: &Path, results: &BenchmarkResults, clues: &[Clue]) -> ExportResult<()> {
    write_file(path, &render_csv(results, clues))
}

/// Render the CSV document without touching the filesystem.
pub fn render_csv(results: &BenchmarkResults, clues: &[Clue]) -> String {
    let clues_by_id: HashMap<&str, &Clue> = clues.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut rows = vec![CSV_HEADER.join(",")];
    for (model, summary) in results.iter() {
        for r in &summary.results {
            let clue = clues_by_id.get(r.clue_id.as_str());
            let cells = [
                model.clone(),
                r.clue_id.clone(),
                clue.map(|c| c.clue.clone()).unwrap_or_default(),
                clue.map(|c| c.answer.clone()).unwrap_or_default(),
                r.answer.clone(),
                if r.pass { "1" } else { "0" }.to_string(),
                r.score.to_string(),
                flatten_newlines(&r.raw),
                optional(r.tokens),
                optional(r.cost),
                optional(r.prompt_tokens),
                optional(r.completion_tokens),
            ];
            let row: Vec<String> = cells.iter().map(|c| escape_csv(c)).collect();
            rows.push(row.join(","));
        }
    }

    rows.join("\n")
}

/// Load a previously written JSON results file.
pub fn load_results(path: &Path) -> ExportResult<BenchmarkResults> {
    read_json(path)
}

/// Load a results file as a raw document, for merging without loss.
pub fn load_document(path: &Path) -> ExportResult<ResultsDocument> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ExportResult<T> {
    let text = fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Snapshot file name for a run finished at `at`,
/// e.g. `results-2025-12-26T11-43-37-400Z.json`.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("results-{}.json", at.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

/// Timestamp portion of a snapshot file name, if it is one.
pub fn snapshot_timestamp(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix("results-")
        .and_then(|rest| rest.strip_suffix(".json"))
}

/// Quote a CSV cell when it contains a delimiter, quote or line break.
pub fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn flatten_newlines(raw: &str) -> String {
    raw.replace("\r\n", " ").replace('\n', " ")
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_file(path: &Path, contents: &str) -> ExportResult<()> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
