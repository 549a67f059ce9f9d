//! Cryptic crossword benchmark runner
//!
//! Sends each clue to one or more chat models through an OpenAI-compatible
//! API, grades the answers with the `grading` crate and persists the results
//! for the dashboard API.
//!
//! # Usage
//!
//! ```bash
//! # One cheap model, results merged into results.json
//! cryptic-bench run --test --out results.json
//!
//! # Several models, CSV export, timestamped snapshots
//! cryptic-bench run --models openai/gpt-4o,anthropic/claude-sonnet-4.5 \
//!     --out out/results.csv --snapshot-dir data
//!
//! # Read-only JSON API over the snapshots
//! cryptic-bench serve --data-dir data --bind 127.0.0.1:3000
//! ```

pub mod client;
pub mod config;
pub mod dashboard;
pub mod orchestrator;
pub mod prompts;
pub mod scheduler;
pub mod solver;

pub use client::{ChatClient, ChatRequest, ChatResponse, ClientError, OpenRouterClient};
pub use config::{BenchConfig, ConfigError, ModelList};
pub use orchestrator::{finalize, Orchestrator, OutputOptions, RunSettings};
pub use solver::{ClueSolver, SolveOptions};
