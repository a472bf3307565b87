//! OpenAI reasoning models: one round trip with a `reasoning_effort` level.
//!
//! The reasoning itself is never returned as text; only its token count is.

use serde_json::json;
use tokio::time::Instant;

use crate::core::provider::Provider;
use crate::error::{RalphError, Result};
use crate::providers::openai::{ChatMessage, ChatRequest, OpenAiClient};
use crate::util::format::format_tokens;

use super::models::{ReasoningRequest, ReasoningResult, TokenUsage, millis};
use super::prompt::{SYSTEM_PROMPT, build_prompt};
use super::{StrategyKind, bounded};

#[derive(Debug, Clone)]
pub struct ReasoningEffortStrategy {
    client: OpenAiClient,
}

impl ReasoningEffortStrategy {
    #[must_use]
    pub const fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    /// Never fails: transport errors become a degraded result.
    pub async fn generate(&self, request: &ReasoningRequest) -> ReasoningResult {
        let started = Instant::now();
        match self.run(request, started).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(model = %request.model, error = %err, "reasoning-effort call failed");
                ReasoningResult::degraded(
                    request,
                    StrategyKind::ReasoningEffort,
                    &err,
                    started.elapsed(),
                )
            }
        }
    }

    async fn run(&self, request: &ReasoningRequest, started: Instant) -> Result<ReasoningResult> {
        let chat = ChatRequest::new(
            &request.model,
            vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(request)),
            ],
        )
        .with_effort(request.effort);

        let response = bounded(Provider::OpenAi, request.timeout, self.client.chat(&chat))
            .await?
            .body;

        let answer = response.text();
        if answer.is_empty() {
            return Err(RalphError::ParseResponse {
                provider: Provider::OpenAi,
                message: "response contained no message content".to_string(),
            });
        }

        let thinking_tokens = response.reasoning_tokens();
        let reasoning_summary = match thinking_tokens {
            Some(tokens) => format!(
                "Reasoned at {} effort using {} reasoning tokens.",
                request.effort,
                format_tokens(tokens)
            ),
            None => format!(
                "Reasoned at {} effort; the provider did not report reasoning token usage.",
                request.effort
            ),
        };
        let usage = response.usage.unwrap_or_default();

        tracing::info!(
            model = %request.model,
            effort = %request.effort,
            reasoning_tokens = thinking_tokens.unwrap_or(0),
            "reasoning-effort call complete"
        );

        Ok(ReasoningResult {
            final_proposal: answer,
            reasoning_summary,
            used_extended_thinking: true,
            model: response.model.clone().unwrap_or_else(|| request.model.clone()),
            metadata: Some(json!({
                "strategy": StrategyKind::ReasoningEffort,
                "provider": Provider::OpenAi,
                "effort": request.effort,
                "finishReason": response.choices.first().and_then(|c| c.finish_reason.clone()),
            })),
            token_usage: Some(TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                thinking_tokens,
            }),
            duration_ms: millis(started.elapsed()),
        })
    }
}
