//! Read-only JSON API over benchmark output files.
//!
//! Serves the latest results file, the list of timestamped snapshots, a single
//! snapshot and a per-model overview. Nothing here writes to disk.

use std::path::{Path, PathBuf};

use axum::extract::{Path as RoutePath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use grading::export::snapshot_timestamp;
use grading::{ModelSummary, ResultsDocument};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Latest-results candidates, checked in order.
const RESULT_CANDIDATES: [&str; 2] = ["results_test.json", "results.json"];

/// Where the dashboard looks for files.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// Snapshot directory (`--snapshot-dir` of the run)
    pub data_dir: PathBuf,
    /// Fallback directory for results files, usually the working directory
    pub root: PathBuf,
}

impl DashboardState {
    pub fn new(data_dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            root: root.into(),
        }
    }

    fn search_dirs(&self) -> [&Path; 2] {
        [self.data_dir.as_path(), self.root.as_path()]
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("No results file found")]
    ResultsNotFound { tried: Vec<PathBuf> },

    #[error("Failed to read {}: {detail}", .file.display())]
    Unreadable { file: PathBuf, detail: String },

    #[error("Data directory not found: {}", .0.display())]
    DataDirMissing(PathBuf),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("No snapshot for timestamp {0}")]
    SnapshotNotFound(String),
}

impl DashboardError {
    fn status(&self) -> StatusCode {
        match self {
            Self::ResultsNotFound { .. } | Self::DataDirMissing(_) | Self::SnapshotNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidTimestamp(_) => StatusCode::BAD_REQUEST,
            Self::Unreadable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        let error = self.to_string();
        match self {
            Self::ResultsNotFound { tried } => json!({
                "error": error,
                "tried": tried.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            }),
            Self::Unreadable { file, detail } => json!({
                "error": "Failed to read results",
                "file": file.display().to_string(),
                "detail": detail,
            }),
            Self::DataDirMissing(dir) => json!({
                "error": error,
                "dataDir": dir.display().to_string(),
            }),
            Self::InvalidTimestamp(_) => json!({ "error": error }),
            Self::SnapshotNotFound(timestamp) => json!({
                "error": error,
                "timestamp": timestamp,
            }),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// One snapshot in the history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: String,
    pub filename: String,
    pub file_path: String,
    pub size: u64,
    pub modified_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub data_dir: String,
    pub files: Vec<HistoryEntry>,
}

/// Contents of the first results file that exists.
pub fn latest_results(state: &DashboardState) -> Result<(PathBuf, Value), DashboardError> {
    let tried: Vec<PathBuf> = state
        .search_dirs()
        .iter()
        .flat_map(|dir| RESULT_CANDIDATES.iter().map(move |name| dir.join(name)))
        .collect();

    let path = tried
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| DashboardError::ResultsNotFound {
            tried: tried.clone(),
        })?;

    debug!(path = %path.display(), "serving latest results");
    let value = read_json(&path)?;
    Ok((path, value))
}

/// Every `results-*.json` snapshot in the data directory, newest first.
pub fn list_history(state: &DashboardState) -> Result<HistoryResponse, DashboardError> {
    let dir = &state.data_dir;
    if !dir.is_dir() {
        return Err(DashboardError::DataDirMissing(dir.clone()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| DashboardError::Unreadable {
        file: dir.clone(),
        detail: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let filename = entry.file_name().to_string_lossy().into_owned();
        let Some(timestamp) = snapshot_timestamp(&filename) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!(file = %filename, error = %e, "skipping unreadable snapshot");
                continue;
            }
        };
        let modified_time = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();

        files.push(HistoryEntry {
            timestamp: timestamp.to_string(),
            file_path: entry.path().display().to_string(),
            filename,
            size: metadata.len(),
            modified_time,
        });
    }

    // Snapshot timestamps sort lexicographically in time order.
    files.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(HistoryResponse {
        data_dir: dir.display().to_string(),
        files,
    })
}

/// One snapshot, with its timestamp and path folded into the object.
pub fn load_snapshot(state: &DashboardState, timestamp: &str) -> Result<Value, DashboardError> {
    if timestamp.is_empty()
        || timestamp.contains('/')
        || timestamp.contains('\\')
        || timestamp.contains("..")
    {
        return Err(DashboardError::InvalidTimestamp(timestamp.to_string()));
    }

    let filename = format!("results-{timestamp}.json");
    let path = state
        .search_dirs()
        .iter()
        .map(|dir| dir.join(&filename))
        .find(|p| p.is_file())
        .ok_or_else(|| DashboardError::SnapshotNotFound(timestamp.to_string()))?;

    let data = read_json(&path)?;

    let mut merged = Map::new();
    merged.insert("timestamp".into(), Value::String(timestamp.to_string()));
    merged.insert("filePath".into(), Value::String(path.display().to_string()));
    match data {
        Value::Object(fields) => merged.extend(fields),
        other => {
            merged.insert("data".into(), other);
        }
    }
    Ok(Value::Object(merged))
}

/// Per-model overview of the latest results.
pub fn summary(state: &DashboardState) -> Result<Vec<ModelSummary>, DashboardError> {
    let (path, value) = latest_results(state)?;
    let document: ResultsDocument =
        serde_json::from_value(value).map_err(|e| DashboardError::Unreadable {
            file: path,
            detail: e.to_string(),
        })?;
    Ok(document.to_results().model_summaries())
}

fn read_json(path: &Path) -> Result<Value, DashboardError> {
    let text = std::fs::read_to_string(path).map_err(|e| DashboardError::Unreadable {
        file: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| DashboardError::Unreadable {
        file: path.to_path_buf(),
        detail: e.to_string(),
    })
}

async fn results_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Value>, DashboardError> {
    latest_results(&state).map(|(_, value)| Json(value))
}

async fn history_handler(
    State(state): State<DashboardState>,
) -> Result<Json<HistoryResponse>, DashboardError> {
    list_history(&state).map(Json)
}

async fn snapshot_handler(
    State(state): State<DashboardState>,
    RoutePath(timestamp): RoutePath<String>,
) -> Result<Json<Value>, DashboardError> {
    load_snapshot(&state, &timestamp).map(Json)
}

async fn summary_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<ModelSummary>>, DashboardError> {
    summary(&state).map(Json)
}

/// The dashboard API routes.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/results", get(results_handler))
        .route("/api/history", get(history_handler))
        .route("/api/results/{timestamp}", get(snapshot_handler))
        .route("/api/summary", get(summary_handler))
        .with_state(state)
}

/// Serve the dashboard API until Ctrl+C.
pub async fn serve(state: DashboardState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(
        bind = %bind,
        data_dir = %state.data_dir.display(),
        "dashboard API listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
}
