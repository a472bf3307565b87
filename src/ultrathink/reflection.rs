//! Reflection fallback for models without a native reasoning mode.
//!
//! Three plain round trips: propose, critique, refine.

use serde_json::json;
use tokio::time::Instant;

use crate::error::{RalphError, Result};
use crate::providers::{Completion, TextClient};

use super::models::{ReasoningRequest, ReasoningResult, TokenUsage, millis};
use super::prompt::{
    CRITIC_SYSTEM_PROMPT, SUMMARY_CHARS, SYSTEM_PROMPT, build_prompt, critique_prompt,
    refine_prompt, summarize,
};
use super::{StrategyKind, bounded};

/// Output cap for each reflection turn.
const TURN_MAX_TOKENS: u32 = 4096;

/// Round trips per invocation.
pub const REFLECTION_TURNS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ReflectionStrategy {
    client: TextClient,
}

impl ReflectionStrategy {
    #[must_use]
    pub const fn new(client: TextClient) -> Self {
        Self { client }
    }

    /// Never fails: transport errors become a degraded result.
    pub async fn generate(&self, request: &ReasoningRequest) -> ReasoningResult {
        let started = Instant::now();
        match self.run(request, started).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(model = %request.model, error = %err, "reflection failed");
                ReasoningResult::degraded(request, StrategyKind::Reflection, &err, started.elapsed())
            }
        }
    }

    async fn run(&self, request: &ReasoningRequest, started: Instant) -> Result<ReasoningResult> {
        let initial = self.turn(request, SYSTEM_PROMPT, &build_prompt(request)).await?;
        tracing::debug!(model = %request.model, "reflection: initial proposal ready");

        let critique = self
            .turn(request, CRITIC_SYSTEM_PROMPT, &critique_prompt(request, &initial.text))
            .await?;
        tracing::debug!(model = %request.model, "reflection: critique ready");

        let refined = self
            .turn(
                request,
                SYSTEM_PROMPT,
                &refine_prompt(request, &initial.text, &critique.text),
            )
            .await?;

        let usage = [&initial, &critique, &refined]
            .iter()
            .fold(TokenUsage::default(), |usage, turn| {
                usage.add(turn.input_tokens, turn.output_tokens)
            });

        tracing::info!(model = %request.model, turns = REFLECTION_TURNS, "reflection complete");

        Ok(ReasoningResult {
            final_proposal: refined.text,
            reasoning_summary: format!(
                "{} (Reflection used {REFLECTION_TURNS} turns: propose, critique, refine.)",
                summarize(&critique.text, SUMMARY_CHARS)
            ),
            used_extended_thinking: true,
            model: request.model.clone(),
            metadata: Some(json!({
                "strategy": StrategyKind::Reflection,
                "provider": self.client.provider(),
                "turns": REFLECTION_TURNS,
            })),
            token_usage: Some(usage),
            duration_ms: millis(started.elapsed()),
        })
    }

    async fn turn(&self, request: &ReasoningRequest, system: &str, prompt: &str) -> Result<Completion> {
        let provider = self.client.provider();
        let completion = bounded(
            provider,
            request.timeout,
            self.client
                .complete(&request.model, system, prompt, TURN_MAX_TOKENS),
        )
        .await?;
        if completion.text.is_empty() {
            return Err(RalphError::ParseResponse {
                provider,
                message: "reflection turn returned no text".to_string(),
            });
        }
        Ok(completion)
    }
}
