use std::path::{Path, PathBuf};
use std::time::Duration;

use grading::{Clue, PriceEntry, PriceTable};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CLUES_PATH: &str = "clues/clues.json";
/// Cheap, fast model used by `--test` and when no models are given.
pub const TEST_MODEL: &str = "openai/gpt-4o-mini";
/// Model run when neither `--models` nor `--models-file` is given.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MODEL_CONCURRENCY: usize = 4;

/// Fatal configuration problems, raised before any clue is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY must be set in the environment or passed with --api-key")]
    MissingApiKey,

    #[error("No clues found at {}", .0.display())]
    CluesNotFound(PathBuf),

    #[error("Failed to read {path}: {reason}", path = .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Invalid JSON in {path}: {reason}", path = .path.display())]
    InvalidJson { path: PathBuf, reason: String },
}

/// Top-level benchmark configuration.
///
/// `Default` reads the environment; CLI flags override individual fields.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// Bearer token for the chat API
    pub api_key: Option<String>,
    /// Clue source JSON array
    pub clues_path: PathBuf,
    /// Clue-level concurrency per model
    pub concurrency: usize,
    /// Models run at once; `None` means `min(4, model_count)`
    pub model_concurrency: Option<usize>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            api_key: std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            clues_path: std::env::var("CRYPTIC_CLUES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLUES_PATH)),
            concurrency: env_usize("CRYPTIC_CONCURRENCY").unwrap_or(DEFAULT_CONCURRENCY),
            model_concurrency: env_usize("CRYPTIC_MODEL_CONCURRENCY"),
            request_timeout: Duration::from_secs(
                env_usize("CRYPTIC_REQUEST_TIMEOUT_SECS").unwrap_or(120) as u64,
            ),
        }
    }
}

impl BenchConfig {
    /// The API key, or a fatal error if none is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    /// Model-level concurrency for `model_count` models.
    pub fn model_concurrency_for(&self, model_count: usize) -> usize {
        self.model_concurrency
            .unwrap_or_else(|| DEFAULT_MODEL_CONCURRENCY.min(model_count))
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Load the clue list. A missing file is reported separately so the CLI can
/// exit before doing anything else.
pub fn load_clues(path: &Path) -> Result<Vec<Clue>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::CluesNotFound(path.to_path_buf()));
    }
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Entry in a models file: a bare id or an id with prices.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelSpec {
    Name(String),
    /// Prices may be spelled camelCase or snake_case; camelCase wins if both are given.
    Priced {
        name: String,
        #[serde(default, rename = "inputCostPerM")]
        input_cost_per_m: Option<f64>,
        #[serde(default, rename = "input_cost_per_m")]
        input_cost_per_m_snake: Option<f64>,
        #[serde(default, rename = "outputCostPerM")]
        output_cost_per_m: Option<f64>,
        #[serde(default, rename = "output_cost_per_m")]
        output_cost_per_m_snake: Option<f64>,
    },
}

impl ModelSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Priced { name, .. } => name,
        }
    }

    fn price(&self) -> Option<PriceEntry> {
        match self {
            Self::Name(_) => None,
            Self::Priced {
                input_cost_per_m,
                input_cost_per_m_snake,
                output_cost_per_m,
                output_cost_per_m_snake,
                ..
            } => {
                let input = input_cost_per_m.or(*input_cost_per_m_snake);
                let output = output_cost_per_m.or(*output_cost_per_m_snake);
                if input.is_none() && output.is_none() {
                    return None;
                }
                Some(PriceEntry::per_million(
                    input.unwrap_or(0.0),
                    output.unwrap_or(0.0),
                ))
            }
        }
    }
}

/// Models to run plus any prices they carry.
#[derive(Debug, Clone, Default)]
pub struct ModelList {
    pub models: Vec<String>,
    pub prices: PriceTable,
}

impl ModelList {
    /// Repeated ids are run once, at their first position.
    pub fn from_specs(specs: Vec<ModelSpec>) -> Self {
        let mut prices = PriceTable::new();
        let mut models: Vec<String> = Vec::with_capacity(specs.len());
        for spec in &specs {
            if let Some(entry) = spec.price() {
                prices = prices.with_entry(spec.name(), entry);
            }
            if !models.iter().any(|m| m == spec.name()) {
                models.push(spec.name().to_string());
            }
        }
        Self { models, prices }
    }

    /// Comma-separated ids, e.g. `--models a/b,c/d`.
    pub fn from_inline(list: &str) -> Self {
        Self::from_specs(
            list.split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(|m| ModelSpec::Name(m.to_string()))
                .collect(),
        )
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        let specs: Vec<ModelSpec> =
            serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_specs(specs))
    }

    pub fn single(model: &str) -> Self {
        Self::from_specs(vec![ModelSpec::Name(model.to_string())])
    }

    /// Pick the model list from CLI inputs.
    ///
    /// Test mode wins over everything, then a models file, then the inline
    /// list. An empty selection falls back to [`DEFAULT_MODEL`].
    pub fn resolve(
        test_mode: bool,
        models_file: Option<&Path>,
        inline: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let list = if test_mode {
            Self::single(TEST_MODEL)
        } else if let Some(path) = models_file {
            Self::from_file(path)?
        } else if let Some(inline) = inline {
            Self::from_inline(inline)
        } else {
            Self::default()
        };

        if list.models.is_empty() {
            return Ok(Self::single(DEFAULT_MODEL));
        }
        Ok(list)
    }
}

/// Load an external price table file.
pub fn load_price_table(path: &Path) -> Result<PriceTable, ConfigError> {
    let text = read(path)?;
    PriceTable::from_json_str(&text).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
