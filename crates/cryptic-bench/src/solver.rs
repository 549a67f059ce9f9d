//! Per-clue solving task.
//!
//! One request per clue, then parse → score → price. `solve` never fails:
//! request or processing errors become a failure record for that clue.

use std::sync::Arc;
use std::time::Instant;

use grading::{
    cost_for_model_tokens, is_pass, parse_response, score_answer, Clue, ModelResult, PriceTable,
    TokenUsage,
};
use tracing::{info, warn};

use crate::client::{ChatClient, ChatRequest, ClientError};
use crate::prompts::solver_messages;
use crate::scheduler::WorkerPool;

const VERBOSE_RAW_LIMIT: usize = 2000;

/// Request settings for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Log the raw response text for each clue
    pub verbose: bool,
}

impl SolveOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: 200,
            verbose: false,
        }
    }
}

/// Solves clues for a single model.
#[derive(Clone)]
pub struct ClueSolver {
    client: Arc<dyn ChatClient>,
    prices: Arc<PriceTable>,
    options: Arc<SolveOptions>,
}

impl ClueSolver {
    pub fn new(client: Arc<dyn ChatClient>, prices: Arc<PriceTable>, options: SolveOptions) -> Self {
        Self {
            client,
            prices,
            options: Arc::new(options),
        }
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Solve one clue. `index` is zero-based and only used for progress output.
    pub async fn solve(&self, index: usize, total: usize, clue: &Clue) -> ModelResult {
        let model = self.model();
        info!(
            model = %model,
            progress = %format!("{}/{}", index + 1, total),
            clue_id = %clue.id,
            clue = %clue.clue,
            "solving clue"
        );

        let start = Instant::now();
        match self.try_solve(clue).await {
            Ok(result) => {
                info!(
                    model = %model,
                    clue_id = %clue.id,
                    answer = %result.answer,
                    verdict = if result.pass { "PASS" } else { "FAIL" },
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    tokens = result.tokens_or_zero(),
                    cost = result.cost_or_zero(),
                    "clue graded"
                );
                if self.options.verbose {
                    let preview: String = result.raw.chars().take(VERBOSE_RAW_LIMIT).collect();
                    info!(model = %model, clue_id = %clue.id, raw = %preview, "raw response");
                }
                result
            }
            Err(e) => {
                warn!(
                    model = %model,
                    clue_id = %clue.id,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "clue failed"
                );
                ModelResult::failure(model, &clue.id, e.to_string())
            }
        }
    }

    async fn try_solve(&self, clue: &Clue) -> Result<ModelResult, ClientError> {
        let request = ChatRequest::new(self.model(), solver_messages(clue))
            .with_max_tokens(self.options.max_tokens)
            .with_temperature(self.options.temperature);

        let response = self.client.send(&request).await?;
        let parsed = parse_response(&response.content);

        let usage = response
            .usage
            .unwrap_or_else(|| TokenUsage::estimate_from_text(&response.content));
        let cost = cost_for_model_tokens(
            &self.prices,
            self.model(),
            usage.prompt_tokens,
            usage.completion_tokens,
        );

        Ok(ModelResult {
            model: self.model().to_string(),
            clue_id: clue.id.clone(),
            score: score_answer(&clue.answer, &parsed.answer),
            pass: is_pass(&clue.answer, &parsed.answer),
            answer: parsed.answer,
            raw: parsed.sanitized,
            tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            cost: None,
        }
        .with_usage(usage, cost))
    }

    /// Solve every clue with at most `concurrency` requests in flight.
    ///
    /// The output has one record per clue, in clue order.
    pub async fn solve_all(&self, clues: Arc<Vec<Clue>>, concurrency: usize) -> Vec<ModelResult> {
        let total = clues.len();
        let pool = WorkerPool::new(concurrency, total);

        let solver = self.clone();
        let task_clues = clues.clone();
        let slots = pool
            .run(total, move |index| {
                let solver = solver.clone();
                let clues = task_clues.clone();
                async move { solver.solve(index, total, &clues[index]).await }
            })
            .await;

        slots
            .into_iter()
            .zip(clues.iter())
            .map(|(slot, clue)| {
                slot.unwrap_or_else(|| {
                    ModelResult::failure(self.model(), &clue.id, "task aborted before completing")
                })
            })
            .collect()
    }
}
