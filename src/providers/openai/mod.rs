//! OpenAI Chat Completions client.
//!
//! Supports:
//! - Plain single-turn completions
//! - Reasoning models via `reasoning_effort`
//!
//! Auth is a bearer token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, dispatch, endpoint};
use crate::core::http::{ApiResponse, send_json};
use crate::core::provider::Provider;
use crate::core::rate_limit::RateLimiter;
use crate::error::Result;
use crate::ultrathink::ReasoningEffort;

/// Chat completions endpoint path.
const CHAT_PATH: &str = "/v1/chat/completions";

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_completion_tokens: None,
            reasoning_effort: None,
        }
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_completion_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub const fn with_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

impl ChatResponse {
    /// Content of the first choice, trimmed. Empty when absent.
    #[must_use]
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn reasoning_tokens(&self) -> Option<u64> {
        self.usage
            .and_then(|usage| usage.completion_tokens_details)
            .and_then(|details| details.reasoning_tokens)
    }
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_base: String,
    api_key: String,
    timeout: Duration,
    limiter: Option<Arc<RateLimiter>>,
}

impl OpenAiClient {
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

    /// POST `/v1/chat/completions`.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or the limiter's refusal when the circuit
    /// is open or retries are exhausted.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ApiResponse<ChatResponse>> {
        let url = endpoint(&self.api_base, CHAT_PATH);
        tracing::debug!(
            model = %request.model,
            effort = ?request.reasoning_effort,
            "sending OpenAI chat request"
        );
        dispatch(Provider::OpenAi, self.limiter.as_deref(), || {
            let builder = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request);
            send_json(Provider::OpenAi, builder, self.timeout)
        })
        .await
    }

    /// Plain completion without a reasoning effort.
    ///
    /// # Errors
    ///
    /// See [`Self::chat`].
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion> {
        let request = ChatRequest::new(
            model,
            vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        )
        .with_max_tokens(max_tokens);
        let response = self.chat(&request).await?.body;
        let usage = response.usage.unwrap_or_default();
        Ok(Completion {
            text: response.text(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}
