//! Response parser
//!
//! Extracts a best-effort answer from free-form model output. The parser never
//! fails: every path ends in a plain string.
//!
//! ```text
//! MessageContent ──into_text──► raw ──strip_fences──► sanitized
//!                                                        │
//!        JsonObject → QuotedKey → BareKey → Passthrough ◄┘   (first hit wins)
//! ```
//!
//! The regex strategies are only consulted when strict JSON parsing fails.
//! Well-formed JSON without an `answer` property goes straight to passthrough.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message content as returned by chat-completion APIs.
///
/// Providers return either a plain string or a list of content fragments
/// (strings, `{ "type": "text", "text": ... }` objects, or nulls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Fragments(Vec<Value>),
    Other(Value),
}

impl MessageContent {
    /// Collapse the content into a single string.
    ///
    /// Fragments are joined with a single space. Null fragments are skipped;
    /// object fragments contribute their `text` field, falling back to `content`.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Fragments(fragments) => fragments
                .iter()
                .filter(|f| !f.is_null())
                .map(fragment_text)
                .collect::<Vec<_>>()
                .join(" "),
            Self::Other(Value::Null) => String::new(),
            Self::Other(Value::String(s)) => s,
            Self::Other(other) => other.to_string(),
        }
    }
}

fn fragment_text(fragment: &Value) -> String {
    match fragment {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .or_else(|| map.get("content").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Extraction strategies in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Sanitized text is a JSON object with an `answer` property.
    JsonObject,
    /// `"answer": "..."` found in otherwise malformed JSON.
    QuotedKey,
    /// `answer: ...` or `answer = ...` in prose.
    BareKey,
    /// The whole sanitized text is taken as the answer.
    Passthrough,
}

impl ExtractionStrategy {
    pub const ORDER: [ExtractionStrategy; 4] = [
        Self::JsonObject,
        Self::QuotedKey,
        Self::BareKey,
        Self::Passthrough,
    ];

    fn attempt(self, sanitized: &str) -> Attempt {
        match self {
            Self::JsonObject => match serde_json::from_str::<Value>(sanitized) {
                Ok(Value::Object(map)) => match map.get("answer") {
                    Some(answer) => Attempt::Hit(stringify(answer)),
                    None => Attempt::Settled,
                },
                Ok(_) => Attempt::Settled,
                Err(_) => Attempt::Miss,
            },
            Self::QuotedKey => capture(quoted_key_re(), sanitized),
            Self::BareKey => capture(bare_key_re(), sanitized),
            Self::Passthrough => Attempt::Hit(sanitized.to_string()),
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JsonObject => write!(f, "json_object"),
            Self::QuotedKey => write!(f, "quoted_key"),
            Self::BareKey => write!(f, "bare_key"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

enum Attempt {
    Hit(String),
    Miss,
    /// Text is valid JSON without an answer; skip the remaining pattern strategies.
    Settled,
}

/// Result of parsing one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    /// Extracted answer, possibly empty
    pub answer: String,
    /// Raw text with code fences removed
    pub sanitized: String,
    /// Strategy that produced `answer`
    pub strategy: ExtractionStrategy,
}

/// Parse raw model output into an answer.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let sanitized = strip_code_fences(raw);

    for strategy in ExtractionStrategy::ORDER {
        match strategy.attempt(&sanitized) {
            Attempt::Hit(answer) => {
                return ParsedResponse {
                    answer,
                    sanitized,
                    strategy,
                }
            }
            Attempt::Miss => continue,
            Attempt::Settled => break,
        }
    }

    ParsedResponse {
        answer: sanitized.clone(),
        sanitized,
        strategy: ExtractionStrategy::Passthrough,
    }
}

/// Replace every triple-backtick fenced block with its trimmed contents.
///
/// Text without a fence is returned unchanged.
pub fn strip_code_fences(raw: &str) -> String {
    let re = fence_re();
    if !re.is_match(raw) {
        return raw.to_string();
    }

    re.replace_all(raw, |caps: &regex::Captures<'_>| {
        caps.get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    })
    .trim()
    .to_string()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capture(re: &Regex, text: &str) -> Attempt {
    match re.captures(text).and_then(|caps| caps.get(1)) {
        Some(m) => Attempt::Hit(m.as_str().trim().to_string()),
        None => Attempt::Miss,
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // An optional language tag is only consumed when a newline follows it,
    // so ```ARGON``` keeps ARGON as content.
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:[A-Za-z0-9_+\-]+[ \t]*\r?\n|[ \t]*\r?\n)?(.*?)```")
            .expect("fence regex is valid")
    })
}

fn quoted_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)"answer"\s*:\s*"([^"]+)""#).expect("quoted key regex is valid")
    })
}

fn bare_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)answer\s*[:=]\s*([A-Za-z0-9'\- ]+)").expect("bare key regex is valid")
    })
}
