//! Anthropic Messages API client.
//!
//! Supports:
//! - Plain single-turn completions
//! - Extended thinking (`thinking.budget_tokens`)
//!
//! Auth is the `x-api-key` header; every request pins `anthropic-version`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, dispatch, endpoint};
use crate::core::http::{ApiResponse, send_json};
use crate::core::provider::Provider;
use crate::core::rate_limit::RateLimiter;
use crate::error::Result;

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages endpoint path.
const MESSAGES_PATH: &str = "/v1/messages";

/// Output tokens reserved for the visible answer on top of a thinking budget.
pub const ANSWER_TOKEN_HEADROOM: u32 = 4096;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

impl MessagesRequest {
    /// A plain request with a single user turn.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: None,
            messages: vec![Message::user(prompt)],
            thinking: None,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Enable extended thinking. `max_tokens` grows to leave room for the
    /// answer after the thinking budget.
    #[must_use]
    pub fn with_thinking(mut self, budget_tokens: u32) -> Self {
        self.thinking = Some(ThinkingConfig::enabled(budget_tokens));
        self.max_tokens = self
            .max_tokens
            .max(budget_tokens.saturating_add(ANSWER_TOKEN_HEADROOM));
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub budget_tokens: u32,
}

impl ThinkingConfig {
    #[must_use]
    pub const fn enabled(budget_tokens: u32) -> Self {
        Self {
            kind: "enabled",
            budget_tokens,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    RedactedThinking {
        #[serde(default)]
        data: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl MessagesResponse {
    /// All text blocks, joined by blank lines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.trim()),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// All visible thinking blocks, joined by blank lines.
    #[must_use]
    pub fn thinking(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Thinking { thinking, .. } => Some(thinking.trim()),
                _ => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Number of thinking blocks the API redacted.
    #[must_use]
    pub fn redacted_blocks(&self) -> usize {
        self.content
            .iter()
            .filter(|block| matches!(block, ContentBlock::RedactedThinking { .. }))
            .count()
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_base: String,
    api_key: String,
    timeout: Duration,
    limiter: Option<Arc<RateLimiter>>,
}

impl AnthropicClient {
    #[must_use]
    pub fn new(
        http: Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
            timeout,
            limiter: None,
        }
    }

    /// Route every round trip through `limiter`.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `/v1/messages`.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or the limiter's refusal when the circuit
    /// is open or retries are exhausted.
    pub async fn messages(&self, request: &MessagesRequest) -> Result<ApiResponse<MessagesResponse>> {
        let url = endpoint(&self.api_base, MESSAGES_PATH);
        tracing::debug!(
            model = %request.model,
            thinking = request.thinking.is_some(),
            max_tokens = request.max_tokens,
            "sending Anthropic messages request"
        );
        dispatch(Provider::Anthropic, self.limiter.as_deref(), || {
            let builder = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(request);
            send_json(Provider::Anthropic, builder, self.timeout)
        })
        .await
    }

    /// Plain completion without thinking.
    ///
    /// # Errors
    ///
    /// See [`Self::messages`].
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion> {
        let request = MessagesRequest::new(model, prompt, max_tokens).with_system(system);
        let response = self.messages(&request).await?.body;
        Ok(Completion {
            text: response.text(),
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_request_serializes_budget() {
        let request = MessagesRequest::new("claude-sonnet-4-5", "hi", 1024).with_thinking(10_000);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["thinking"]["type"], "enabled");
        assert_eq!(json["thinking"]["budget_tokens"], 10_000);
        assert_eq!(json["max_tokens"], 14_096);
        assert!(json.get("system").is_none());
    }

    #[test]
    fn plain_request_omits_thinking() {
        let request = MessagesRequest::new("claude-3-5-haiku", "hi", 512).with_system("be brief");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("thinking").is_none());
        assert_eq!(json["system"], "be brief");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_splits_thinking_and_text() {
        let body = r#"{
            "id": "msg_1",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "thinking", "thinking": "Consider the lock.", "signature": "sig"},
                {"type": "redacted_thinking", "data": "xyz"},
                {"type": "text", "text": "Use a mutex."},
                {"type": "tool_use", "id": "t", "name": "x", "input": {}}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 120, "output_tokens": 340}
        }"#;
        let response: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.thinking(), "Consider the lock.");
        assert_eq!(response.text(), "Use a mutex.");
        assert_eq!(response.redacted_blocks(), 1);
        assert_eq!(response.usage.output_tokens, 340);
    }

    #[test]
    fn response_tolerates_missing_usage() {
        let response: MessagesResponse =
            serde_json::from_str(r#"{"content": [{"type": "text", "text": "ok"}]}"#).unwrap();
        assert_eq!(response.usage, Usage::default());
        assert_eq!(response.text(), "ok");
    }
}
