//! Grading library for the cryptic crossword benchmark
//!
//! Everything in this crate is deterministic and network-free:
//! - `scorer`: normalization, edit distance, graded score and pass judgment
//! - `parser`: turns raw model output into a best-effort answer string
//! - `pricing`: immutable price table and token cost estimation
//! - `types`: clues, per-clue results and per-model summaries
//! - `results`: merging, ranking and dashboard summaries across models
//! - `export`: JSON/CSV persistence and snapshot naming
//!
//! # Pipeline
//!
//! ```text
//! raw response → parser::parse_response → scorer::{score_answer, is_pass}
//!                                              ↓
//!                  pricing::cost_for_model_tokens → ModelResult
//! ```

pub mod export;
pub mod parser;
pub mod pricing;
pub mod results;
pub mod scorer;
pub mod types;

pub use export::{ExportError, ExportFormat};
pub use parser::{parse_response, ExtractionStrategy, MessageContent, ParsedResponse};
pub use pricing::{cost_for_model_tokens, PriceEntry, PriceTable};
pub use results::{
    format_ranking, pretty_percent, BenchmarkResults, ModelSummary, RankingEntry,
    ResultsDocument,
};
pub use scorer::{edit_distance, is_pass, normalize, score_answer};
pub use types::{Clue, ModelResult, ModelRunSummary, TokenUsage};
