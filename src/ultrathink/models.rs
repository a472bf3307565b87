//! Request and result types shared by every reasoning strategy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::http::DEFAULT_TIMEOUT;
use crate::error::RalphError;

use super::{DEFAULT_THINKING_BUDGET, StrategyKind};

/// Effort level for reasoning-effort models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    #[default]
    High,
}

impl ReasoningEffort {
    pub const ALL: &'static [Self] = &[Self::Low, Self::Medium, Self::High];

    /// Parse from a CLI or config value (case-insensitive).
    #[must_use]
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A web search hit used to ground the proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Everything a strategy needs to produce a proposal.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub title: String,
    pub description: String,
    /// Concerns raised during review that the proposal must address.
    pub concerns: Vec<String>,
    pub search_results: Vec<SearchSnippet>,
    pub model: String,
    /// Upper bound for each network round trip.
    pub timeout: Duration,
    pub thinking_budget: u32,
    pub effort: ReasoningEffort,
}

impl ReasoningRequest {
    #[must_use]
    pub fn new(title: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            concerns: Vec::new(),
            search_results: Vec::new(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            thinking_budget: DEFAULT_THINKING_BUDGET,
            effort: ReasoningEffort::default(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_concerns<I, S>(mut self, concerns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concerns = concerns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_search_results(mut self, results: Vec<SearchSnippet>) -> Self {
        self.search_results = results;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }

    #[must_use]
    pub const fn with_effort(mut self, effort: ReasoningEffort) -> Self {
        self.effort = effort;
        self
    }
}

/// Token accounting for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_tokens: Option<u64>,
}

impl TokenUsage {
    #[must_use]
    pub const fn add(self, input: u64, output: u64) -> Self {
        Self {
            input_tokens: self.input_tokens + input,
            output_tokens: self.output_tokens + output,
            thinking_tokens: self.thinking_tokens,
        }
    }
}

/// Normalized output of every strategy, including failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningResult {
    pub final_proposal: String,
    pub reasoning_summary: String,
    pub used_extended_thinking: bool,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub duration_ms: u64,
}

impl ReasoningResult {
    /// Result for a strategy whose round trip failed.
    #[must_use]
    pub fn degraded(
        request: &ReasoningRequest,
        kind: StrategyKind,
        error: &RalphError,
        elapsed: Duration,
    ) -> Self {
        Self {
            final_proposal: standard_approach(&request.title),
            reasoning_summary: format!("{} reasoning failed: {error}", kind.label()),
            used_extended_thinking: false,
            model: request.model.clone(),
            metadata: Some(json!({
                "strategy": kind,
                "degraded": true,
                "errorCode": error.error_code(),
                "retryable": error.is_retryable(),
            })),
            token_usage: None,
            duration_ms: millis(elapsed),
        }
    }

    /// Result when no strategy could be built for the model.
    #[must_use]
    pub fn no_provider(request: &ReasoningRequest) -> Self {
        Self {
            final_proposal: standard_approach(&request.title),
            reasoning_summary: format!(
                "No reasoning provider configured for model \"{}\"; using the standard approach.",
                request.model
            ),
            used_extended_thinking: false,
            model: request.model.clone(),
            metadata: None,
            token_usage: None,
            duration_ms: 0,
        }
    }

    /// Whether this result came from a failed or skipped reasoning call.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.used_extended_thinking
    }
}

fn standard_approach(title: &str) -> String {
    format!(
        "Deep reasoning is unavailable. Proceed with the standard implementation approach for \"{title}\", addressing the raised concerns directly."
    )
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
