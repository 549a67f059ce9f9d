//! Benchmark data model
//!
//! Clues are loaded once per run and never mutated. Exactly one [`ModelResult`]
//! is produced per (model, clue) pair, including a synthetic failure record when
//! the request or downstream processing fails.

use serde::{Deserialize, Serialize};

/// A single cryptic crossword clue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    /// Identifier, unique within a run
    pub id: String,
    /// Clue text shown to the model
    pub clue: String,
    /// Canonical expected answer
    pub answer: String,
    /// Optional free-text notes (wordplay explanation etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Token counts for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build usage from prompt and completion counts; total is their sum.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Rough estimate used when the API reports no usage.
    ///
    /// One token per four characters of response text (rounded up), split
    /// evenly between prompt and completion.
    pub fn estimate_from_text(raw: &str) -> Self {
        let estimate = raw.chars().count().div_ceil(4) as u64;
        let prompt = estimate / 2;
        Self::new(prompt, estimate - prompt)
    }
}

/// Outcome of one model answering one clue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    pub model: String,
    pub clue_id: String,
    /// Extracted answer text (possibly empty)
    pub answer: String,
    /// Sanitized raw response, or the error message for failure records
    #[serde(default)]
    pub raw: String,
    /// Graded score in `[0, 1]`
    #[serde(default)]
    pub score: f64,
    pub pass: bool,
    /// Total tokens; absent in results written by older runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Estimated cost in currency units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl ModelResult {
    /// Synthetic record for a clue whose request or processing failed.
    pub fn failure(model: &str, clue_id: &str, message: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            clue_id: clue_id.to_string(),
            answer: String::new(),
            raw: message.into(),
            score: 0.0,
            pass: false,
            tokens: Some(0),
            prompt_tokens: Some(0),
            completion_tokens: Some(0),
            cost: Some(0.0),
        }
    }

    /// Attach token usage and cost to this record.
    pub fn with_usage(mut self, usage: TokenUsage, cost: f64) -> Self {
        self.tokens = Some(usage.total_tokens);
        self.prompt_tokens = Some(usage.prompt_tokens);
        self.completion_tokens = Some(usage.completion_tokens);
        self.cost = Some(cost);
        self
    }

    /// Total tokens, treating an absent field as zero.
    pub fn tokens_or_zero(&self) -> u64 {
        self.tokens.unwrap_or(0)
    }

    /// Cost, treating an absent field as zero.
    pub fn cost_or_zero(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }
}

/// Aggregated outcome for one model across all clues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRunSummary {
    pub total: usize,
    pub pass_count: usize,
    /// `pass_count / total`, 0 when there are no results
    pub pass_rate: f64,
    /// Results in clue order
    pub results: Vec<ModelResult>,
}

impl ModelRunSummary {
    /// Recompute counts from an ordered result list.
    pub fn from_results(results: Vec<ModelResult>) -> Self {
        let total = results.len();
        let pass_count = results.iter().filter(|r| r.pass).count();
        let pass_rate = if total > 0 {
            pass_count as f64 / total as f64
        } else {
            0.0
        };

        Self {
            total,
            pass_count,
            pass_rate,
            results,
        }
    }

    /// Sum of known costs across results.
    pub fn total_cost(&self) -> f64 {
        self.results.iter().map(ModelResult::cost_or_zero).sum()
    }

    /// Sum of known token counts across results.
    pub fn total_tokens(&self) -> u64 {
        self.results.iter().map(ModelResult::tokens_or_zero).sum()
    }
}
