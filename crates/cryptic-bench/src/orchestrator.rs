//! Benchmark orchestration
//!
//! Runs every model through the clue pool, using the same bounded worker pool
//! one level up so several models can be in flight at once.
//!
//! ```text
//! models ──WorkerPool(model_concurrency)──► ClueSolver::solve_all
//!                                               └─ WorkerPool(concurrency) ─► clues
//!                       ↓
//!            BenchmarkResults ── merge with previous ──► ranking + export
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grading::export::{
    ensure_dir_for_file, load_document, save_csv, save_json, snapshot_file_name, ExportResult,
};
use grading::{
    format_ranking, pretty_percent, BenchmarkResults, Clue, ExportFormat, ModelResult,
    ModelRunSummary, PriceTable, ResultsDocument,
};
use tracing::{error, info, warn};

use crate::client::ChatClient;
use crate::scheduler::WorkerPool;
use crate::solver::{ClueSolver, SolveOptions};

/// Concurrency and request settings for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Clues in flight per model
    pub clue_concurrency: usize,
    /// Models in flight at once
    pub model_concurrency: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            clue_concurrency: 4,
            model_concurrency: 4,
            temperature: 0.0,
            max_tokens: 200,
            verbose: false,
        }
    }
}

/// Drives one benchmark run across models.
pub struct Orchestrator {
    client: Arc<dyn ChatClient>,
    prices: Arc<PriceTable>,
    clues: Arc<Vec<Clue>>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ChatClient>,
        prices: PriceTable,
        clues: Vec<Clue>,
        settings: RunSettings,
    ) -> Self {
        Self {
            client,
            prices: Arc::new(prices),
            clues: Arc::new(clues),
            settings,
        }
    }

    pub fn clues(&self) -> &[Clue] {
        &self.clues
    }

    fn solver_for(&self, model: &str) -> ClueSolver {
        let options = SolveOptions {
            model: model.to_string(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            verbose: self.settings.verbose,
        };
        ClueSolver::new(self.client.clone(), self.prices.clone(), options)
    }

    /// Run every model over every clue.
    pub async fn run(&self, models: &[String]) -> BenchmarkResults {
        info!(
            models = %models.join(", "),
            clues = self.clues.len(),
            "running cryptic benchmark"
        );

        let pool = WorkerPool::new(self.settings.model_concurrency, models.len());
        let solvers: Arc<Vec<ClueSolver>> =
            Arc::new(models.iter().map(|m| self.solver_for(m)).collect());
        let clues = self.clues.clone();
        let clue_concurrency = self.settings.clue_concurrency;

        let slots = pool
            .run(models.len(), move |index| {
                let solver = solvers[index].clone();
                let clues = clues.clone();
                async move {
                    info!(model = %solver.model(), "running model");
                    let results = solver.solve_all(clues, clue_concurrency).await;
                    ModelRunSummary::from_results(results)
                }
            })
            .await;

        let mut results = BenchmarkResults::new();
        for (model, slot) in models.iter().zip(slots) {
            let summary = slot.unwrap_or_else(|| {
                warn!(model = %model, "model run aborted; recording every clue as failed");
                ModelRunSummary::from_results(
                    self.clues
                        .iter()
                        .map(|c| ModelResult::failure(model, &c.id, "model run aborted"))
                        .collect(),
                )
            });
            info!(
                "Model {}: {}/{} passed, pass rate {}",
                model,
                summary.pass_count,
                summary.total,
                pretty_percent(summary.pass_rate)
            );
            results.insert(model.clone(), summary);
        }
        results
    }
}

/// Where and how to persist a finished run.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Output file; `.csv` selects CSV, anything else JSON
    pub out: Option<PathBuf>,
    /// Directory for timestamped JSON snapshots
    pub snapshot_dir: Option<PathBuf>,
    /// Overwrite instead of merging into an existing JSON output
    pub fresh: bool,
}

/// Merge with previous results, print the ranking and export.
///
/// Export failures are logged and never abort the run. Returns the typed view
/// of the merged results that were printed and written.
pub fn finalize(
    results: BenchmarkResults,
    clues: &[Clue],
    output: &OutputOptions,
    finished_at: DateTime<Utc>,
) -> BenchmarkResults {
    let document = match output.out.as_deref() {
        Some(path) if !output.fresh => merge_with_previous(&results, path),
        _ => fresh_document(&results),
    };
    let merged = document.to_results();

    println!();
    print!("{}", format_ranking(&merged.ranking()));

    if let Some(path) = output.out.as_deref() {
        match export_results(path, &document, &merged, clues) {
            Ok(()) => info!(path = %path.display(), "saved results"),
            Err(e) => error!(error = %e, "failed to save results"),
        }
    }

    if let Some(dir) = output.snapshot_dir.as_deref() {
        let path = dir.join(snapshot_file_name(finished_at));
        match ensure_dir_for_file(&path).and_then(|()| save_json(&path, &document)) {
            Ok(()) => info!(path = %path.display(), "saved snapshot"),
            Err(e) => error!(error = %e, "failed to save snapshot"),
        }
    }

    merged
}

/// Overlay `results` onto the JSON file at `path` when one exists.
///
/// Entries for models not in `results` are carried over verbatim.
pub fn merge_with_previous(results: &BenchmarkResults, path: &Path) -> ResultsDocument {
    if ExportFormat::from_path(path) != ExportFormat::Json || !path.exists() {
        return fresh_document(results);
    }

    let previous = match load_document(path) {
        Ok(previous) => previous,
        Err(e) => {
            warn!(error = %e, "previous results unreadable, writing fresh results");
            return fresh_document(results);
        }
    };

    info!(
        path = %path.display(),
        previous_models = previous.len(),
        "merging with previous results"
    );
    match previous.overlay(results) {
        Ok(merged) => merged,
        Err(e) => {
            warn!(error = %e, "could not merge with previous results, writing fresh results");
            fresh_document(results)
        }
    }
}

fn fresh_document(results: &BenchmarkResults) -> ResultsDocument {
    ResultsDocument::from_results(results).unwrap_or_else(|e| {
        error!(error = %e, "failed to encode results");
        ResultsDocument::new()
    })
}

/// Write results in the format implied by the path's extension.
///
/// JSON writes the raw document; CSV flattens the typed view.
pub fn export_results(
    path: &Path,
    document: &ResultsDocument,
    results: &BenchmarkResults,
    clues: &[Clue],
) -> ExportResult<()> {
    ensure_dir_for_file(path)?;
    match ExportFormat::from_path(path) {
        ExportFormat::Csv => save_csv(path, results, clues),
        ExportFormat::Json => save_json(path, document),
    }
}
