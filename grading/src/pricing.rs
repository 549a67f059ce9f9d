//! Cost estimation from token counts.
//!
//! Prices are held in an explicitly constructed, immutable [`PriceTable`] that
//! callers pass in. Unknown models and malformed entries price at zero; missing
//! prices are never an error.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

/// Per-model rates in currency units per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceEntry {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl PriceEntry {
    pub fn per_million(input: f64, output: f64) -> Self {
        Self {
            input_per_million: input,
            output_per_million: output,
        }
    }

    /// Older price tables quote rates per thousand tokens.
    pub fn per_thousand(input: f64, output: f64) -> Self {
        Self::per_million(input * 1000.0, output * 1000.0)
    }

    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (self.input_per_million * prompt_tokens as f64
            + self.output_per_million * completion_tokens as f64)
            / 1_000_000.0
    }
}

/// Field spellings accepted in price table files, preferred first.
const INPUT_PER_MILLION: &[&str] = &["inputCostPerM", "input_cost_per_m"];
const OUTPUT_PER_MILLION: &[&str] = &["outputCostPerM", "output_cost_per_m"];
const INPUT_PER_THOUSAND: &[&str] = &["inputCostPerK", "input_cost_per_k", "inputCostPer1K"];
const OUTPUT_PER_THOUSAND: &[&str] = &["outputCostPerK", "output_cost_per_k", "outputCostPer1K"];

/// Read one price table entry. Per-million rates win over per-thousand ones.
fn parse_price_entry(raw: &Value) -> Result<PriceEntry, String> {
    let fields = raw
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;

    let input = match rate(fields, INPUT_PER_MILLION)? {
        Some(m) => Some(m),
        None => rate(fields, INPUT_PER_THOUSAND)?.map(|k| k * 1000.0),
    };
    let output = match rate(fields, OUTPUT_PER_MILLION)? {
        Some(m) => Some(m),
        None => rate(fields, OUTPUT_PER_THOUSAND)?.map(|k| k * 1000.0),
    };
    Ok(PriceEntry::per_million(
        input.unwrap_or(0.0),
        output.unwrap_or(0.0),
    ))
}

/// First present spelling of a rate; null counts as absent.
fn rate(fields: &Map<String, Value>, keys: &[&str]) -> Result<Option<f64>, String> {
    for key in keys {
        match fields.get(*key) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                return value
                    .as_f64()
                    .map(Some)
                    .ok_or_else(|| format!("{key} is not a number"));
            }
        }
    }
    Ok(None)
}

/// Immutable model-id → price lookup.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    entries: HashMap<String, PriceEntry>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known OpenRouter models with their published rates.
    pub fn builtin() -> Self {
        Self::new()
            .with_entry("openai/gpt-4o-mini", PriceEntry::per_million(0.15, 0.6))
            .with_entry("openai/gpt-4o", PriceEntry::per_million(2.5, 10.0))
            .with_entry("openai/gpt-5", PriceEntry::per_million(1.25, 10.0))
            .with_entry("openai/gpt-5.1", PriceEntry::per_million(1.5, 10.0))
            .with_entry("openai/gpt-5.2", PriceEntry::per_million(1.75, 14.0))
            .with_entry(
                "anthropic/claude-sonnet-4.5",
                PriceEntry::per_million(3.0, 15.0),
            )
            .with_entry("anthropic/claude-opus-4.5", PriceEntry::per_million(5.0, 25.0))
            .with_entry(
                "anthropic/claude-3.5-sonnet",
                PriceEntry::per_million(3.0, 15.0),
            )
            .with_entry(
                "google/gemini-3-flash-preview",
                PriceEntry::per_million(0.5, 3.0),
            )
            .with_entry(
                "google/gemini-3-pro-preview",
                PriceEntry::per_million(2.0, 12.0),
            )
            .with_entry("google/gemini-2.5-flash", PriceEntry::per_million(0.15, 0.6))
            .with_entry(
                "meta/llama-3.1-405b-instruct",
                PriceEntry::per_million(3.5, 3.5),
            )
            .with_entry("deepseek/deepseek-v3", PriceEntry::per_million(0.27, 1.1))
            .with_entry("minimax/minimax-m2.1", PriceEntry::per_million(0.3, 1.2))
            .with_entry("z-ai/glm-4.7", PriceEntry::per_million(0.6, 2.2))
            .with_entry("x-ai/grok-4.1-fast", PriceEntry::per_million(0.2, 0.5))
    }

    /// Build a table from a JSON object keyed by model id.
    ///
    /// Entries that fail to parse are kept at zero cost and logged.
    pub fn from_json_value(value: &Value) -> Self {
        let mut table = Self::new();
        let Some(map) = value.as_object() else {
            warn!("price table is not a JSON object; using zero-cost table");
            return table;
        };

        for (model, raw) in map {
            let entry = match parse_price_entry(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(model = %model, error = %e, "malformed price entry, pricing at zero");
                    PriceEntry::default()
                }
            };
            table.entries.insert(model.clone(), entry);
        }
        table
    }

    /// Parse a price table from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_json_value(&value))
    }

    pub fn with_entry(mut self, model: impl Into<String>, entry: PriceEntry) -> Self {
        self.entries.insert(model.into(), entry);
        self
    }

    /// Overlay entries from `other`; its prices win on conflict.
    pub fn extend(mut self, other: PriceTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn get(&self, model: &str) -> Option<&PriceEntry> {
        self.entries.get(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Estimated cost of one request. Unknown models cost zero.
pub fn cost_for_model_tokens(
    table: &PriceTable,
    model: &str,
    prompt_tokens: u64,
    completion_tokens: u64,
) -> f64 {
    match table.get(model) {
        Some(entry) => entry.cost(prompt_tokens, completion_tokens),
        None => {
            warn!(model = %model, "no price entry for model, cost recorded as 0");
            0.0
        }
    }
}
