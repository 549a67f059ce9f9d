//! Chat-completion client
//!
//! A single generic "send chat request" call behind the [`ChatClient`] trait,
//! with one HTTP implementation for OpenAI-compatible endpoints (OpenRouter).
//!
//! Wire responses vary: content is either a string or a list of fragments, and
//! usage counters arrive in snake_case or camelCase. Everything is normalized
//! into [`ChatResponse`] before the rest of the pipeline sees it.

use std::time::Duration;

use async_trait::async_trait;
use grading::{MessageContent, TokenUsage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the chat API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Response contained no choices")]
    EmptyResponse,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Non-streaming chat-completion request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: 200,
            temperature: 0.0,
            stream: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Canonical response shape used downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// First choice's content, flattened to one string
    pub content: String,
    /// Usage reported by the API, if any
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Usage counters; either spelling may appear, or both. snake_case wins.
#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default, rename = "promptTokens")]
    prompt_tokens_camel: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default, rename = "completionTokens")]
    completion_tokens_camel: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
    #[serde(default, rename = "totalTokens")]
    total_tokens_camel: Option<u64>,
}

impl WireUsage {
    fn normalize(self) -> TokenUsage {
        let prompt = self.prompt_tokens.or(self.prompt_tokens_camel).unwrap_or(0);
        let completion = self
            .completion_tokens
            .or(self.completion_tokens_camel)
            .unwrap_or(0);
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: self
                .total_tokens
                .or(self.total_tokens_camel)
                .unwrap_or(prompt + completion),
        }
    }
}

impl WireResponse {
    fn normalize(self) -> Result<ChatResponse, ClientError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyResponse)?;
        let content = choice
            .message
            .and_then(|m| m.content)
            .map(MessageContent::into_text)
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            usage: self.usage.map(WireUsage::normalize),
        })
    }
}

/// Parse a raw chat-completion JSON body into the canonical shape.
pub fn parse_chat_response(body: &str) -> Result<ChatResponse, ClientError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| ClientError::ParseError(e.to_string()))?;
    wire.normalize()
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;
}

/// OpenAI-compatible HTTP client (OpenRouter by default).
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::RequestFailed(format!("client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatClient for OpenRouterClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        debug!(model = %request.model, url = %self.completions_url(), "sending chat request");

        let response = self
            .http
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_chat_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest::new(
            "openai/gpt-4o-mini",
            vec![ChatMessage::system("sys"), ChatMessage::user("clue")],
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "clue");
    }

    #[test]
    fn test_parse_string_content_snake_case_usage() {
        let response = parse_chat_response(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"answer\":\"CAT\"}"}}],
                "usage":{"prompt_tokens":12,"completion_tokens":4,"total_tokens":16}}"#,
        )
        .unwrap();
        assert_eq!(response.content, "{\"answer\":\"CAT\"}");
        assert_eq!(response.usage, Some(TokenUsage::new(12, 4)));
    }

    #[test]
    fn test_parse_fragment_content_camel_case_usage() {
        let response = parse_chat_response(
            r#"{"choices":[{"message":{"content":[{"type":"text","text":"part one"},null,{"content":"two"}]}}],
                "usage":{"promptTokens":7,"completionTokens":3}}"#,
        )
        .unwrap();
        assert_eq!(response.content, "part one two");
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.completion_tokens, 3);
        assert_eq!(usage.total_tokens, 10);
    }

    #[test]
    fn test_parse_usage_with_both_spellings() {
        let response = parse_chat_response(
            r#"{"choices":[{"message":{"content":"ARGON"}}],
                "usage":{"prompt_tokens":12,"promptTokens":99,
                         "completion_tokens":4,"completionTokens":99,"totalTokens":16}}"#,
        )
        .unwrap();
        assert_eq!(response.content, "ARGON");
        assert_eq!(response.usage, Some(TokenUsage::new(12, 4)));
    }

    #[test]
    fn test_parse_missing_usage_and_null_content() {
        let response =
            parse_chat_response(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(response.content, "");
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_chat_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ClientError::EmptyResponse));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_chat_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ClientError::ParseError(_)));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let client =
            OpenRouterClient::new("https://openrouter.ai/api/v1/", "k", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
