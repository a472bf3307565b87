//! Anthropic extended thinking: one round trip with a thinking budget.

use serde_json::json;
use tokio::time::Instant;

use crate::core::provider::Provider;
use crate::error::{RalphError, Result};
use crate::providers::anthropic::{AnthropicClient, MessagesRequest};

use super::models::{ReasoningRequest, ReasoningResult, TokenUsage, millis};
use super::prompt::{SUMMARY_CHARS, SYSTEM_PROMPT, build_prompt, summarize};
use super::{MIN_THINKING_BUDGET, StrategyKind, bounded};

#[derive(Debug, Clone)]
pub struct ExtendedThinkingStrategy {
    client: AnthropicClient,
}

impl ExtendedThinkingStrategy {
    #[must_use]
    pub const fn new(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// Never fails: transport errors become a degraded result.
    pub async fn generate(&self, request: &ReasoningRequest) -> ReasoningResult {
        let started = Instant::now();
        match self.run(request, started).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(model = %request.model, error = %err, "extended thinking failed");
                ReasoningResult::degraded(
                    request,
                    StrategyKind::ExtendedThinking,
                    &err,
                    started.elapsed(),
                )
            }
        }
    }

    async fn run(&self, request: &ReasoningRequest, started: Instant) -> Result<ReasoningResult> {
        let budget = request.thinking_budget.max(MIN_THINKING_BUDGET);
        let message = MessagesRequest::new(&request.model, build_prompt(request), 0)
            .with_system(SYSTEM_PROMPT)
            .with_thinking(budget);

        let response = bounded(
            Provider::Anthropic,
            request.timeout,
            self.client.messages(&message),
        )
        .await?
        .body;

        let answer = response.text();
        if answer.is_empty() {
            return Err(RalphError::ParseResponse {
                provider: Provider::Anthropic,
                message: "response contained no text block".to_string(),
            });
        }

        let trace = response.thinking();
        let redacted = response.redacted_blocks();
        let reasoning_summary = if !trace.is_empty() {
            summarize(&trace, SUMMARY_CHARS)
        } else if redacted > 0 {
            format!("Thinking was redacted by the provider ({redacted} block(s)).")
        } else {
            "The provider returned no thinking trace.".to_string()
        };

        tracing::info!(
            model = %request.model,
            budget,
            trace_chars = trace.chars().count(),
            "extended thinking complete"
        );

        Ok(ReasoningResult {
            final_proposal: answer,
            reasoning_summary,
            used_extended_thinking: true,
            model: response.model.clone().unwrap_or_else(|| request.model.clone()),
            metadata: Some(json!({
                "strategy": StrategyKind::ExtendedThinking,
                "provider": Provider::Anthropic,
                "thinkingBudget": budget,
                "redactedBlocks": redacted,
                "stopReason": response.stop_reason,
            })),
            token_usage: Some(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                thinking_tokens: None,
            }),
            duration_ms: millis(started.elapsed()),
        })
    }
}
