//! Cross-model results: merge, ranking and dashboard summaries.
//!
//! [`BenchmarkResults`] serializes as a plain JSON object keyed by model name,
//! the format consumed by the dashboard and by later merge runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::ModelRunSummary;

/// Per-model summaries for one or more runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkResults {
    models: BTreeMap<String, ModelRunSummary>,
}

impl BenchmarkResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a model's summary, replacing any previous one.
    pub fn insert(&mut self, model: impl Into<String>, summary: ModelRunSummary) {
        self.models.insert(model.into(), summary);
    }

    pub fn get(&self, model: &str) -> Option<&ModelRunSummary> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelRunSummary)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models ordered by descending pass rate. Ties keep name order.
    pub fn ranking(&self) -> Vec<RankingEntry> {
        let mut entries: Vec<RankingEntry> = self
            .models
            .iter()
            .map(|(model, summary)| RankingEntry {
                model: model.clone(),
                pass_rate: summary.pass_rate,
                pass_count: summary.pass_count,
                total: summary.total,
                total_cost: summary.total_cost(),
                total_tokens: summary.total_tokens(),
            })
            .collect();
        entries.sort_by(|a, b| b.pass_rate.total_cmp(&a.pass_rate));
        entries
    }

    /// Dashboard overview rows, ordered by descending pass rate.
    pub fn model_summaries(&self) -> Vec<ModelSummary> {
        let mut summaries: Vec<ModelSummary> = self
            .models
            .iter()
            .map(|(name, summary)| {
                let average_tokens = if summary.results.is_empty() {
                    0
                } else {
                    (summary.total_tokens() as f64 / summary.results.len() as f64).round() as u64
                };
                ModelSummary {
                    name: name.clone(),
                    total: summary.total,
                    pass_count: summary.pass_count,
                    pass_rate: summary.pass_rate,
                    total_cost: summary.total_cost(),
                    average_tokens,
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.pass_rate.total_cmp(&a.pass_rate));
        summaries
    }
}

/// A persisted results file kept as raw JSON.
///
/// Entries a run did not touch are written back exactly as they were read,
/// including fields this crate does not model and integer-valued numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsDocument {
    entries: Map<String, Value>,
}

impl ResultsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: &BenchmarkResults) -> Result<Self, serde_json::Error> {
        Self::new().overlay(results)
    }

    /// Replace same-named entries with this run's summaries; keep the rest.
    pub fn overlay(mut self, fresh: &BenchmarkResults) -> Result<Self, serde_json::Error> {
        for (model, summary) in fresh.iter() {
            self.entries
                .insert(model.clone(), serde_json::to_value(summary)?);
        }
        Ok(self)
    }

    pub fn get(&self, model: &str) -> Option<&Value> {
        self.entries.get(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Typed view for ranking and CSV export.
    ///
    /// Entries that do not match the summary shape are left out of the view
    /// (and logged) but stay in the document.
    pub fn to_results(&self) -> BenchmarkResults {
        let mut results = BenchmarkResults::new();
        for (model, value) in &self.entries {
            match ModelRunSummary::deserialize(value) {
                Ok(summary) => results.insert(model.clone(), summary),
                Err(e) => warn!(model = %model, error = %e, "skipping malformed results entry"),
            }
        }
        results
    }
}

/// One line of the final ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub model: String,
    pub pass_rate: f64,
    pub pass_count: usize,
    pub total: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
}

/// Overview row served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub name: String,
    pub total: usize,
    pub pass_count: usize,
    pub pass_rate: f64,
    pub total_cost: f64,
    pub average_tokens: u64,
}

/// Whole-percent rendering of a rate, e.g. `0.5` → `"50%"`.
pub fn pretty_percent(rate: f64) -> String {
    format!("{}%", (rate * 100.0).round() as i64)
}

/// Format the ranking as a console table.
pub fn format_ranking(entries: &[RankingEntry]) -> String {
    let mut report = String::new();

    report.push_str("=== Ranking ===\n");
    for (i, entry) in entries.iter().enumerate() {
        report.push_str(&format!(
            "{}. {} — pass {} ({}/{}) | tokens {} | cost ${:.6}\n",
            i + 1,
            entry.model,
            pretty_percent(entry.pass_rate),
            entry.pass_count,
            entry.total,
            entry.total_tokens,
            entry.total_cost,
        ));
    }

    report
}
