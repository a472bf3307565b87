//! Ultrathink: deep-reasoning tie-breaker proposals.
//!
//! Three interchangeable backends behind one contract:
//! - [`ExtendedThinkingStrategy`]: Anthropic thinking-capable models
//! - [`ReasoningEffortStrategy`]: OpenAI o-series and gpt-5 models
//! - [`ReflectionStrategy`]: any other model, via propose/critique/refine
//!
//! [`ReasoningStrategy::for_model`] picks one from the model identifier and
//! the available credentials. Every backend returns a well-formed
//! [`ReasoningResult`], degrading on transport failure instead of erroring.

pub mod extended_thinking;
pub mod models;
pub mod prompt;
pub mod reasoning_effort;
pub mod reflection;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

pub use extended_thinking::ExtendedThinkingStrategy;
pub use models::{ReasoningEffort, ReasoningRequest, ReasoningResult, SearchSnippet, TokenUsage};
pub use reasoning_effort::ReasoningEffortStrategy;
pub use reflection::ReflectionStrategy;

use crate::core::credentials::Credentials;
use crate::core::http::{DEFAULT_TIMEOUT, build_client};
use crate::core::provider::Provider;
use crate::core::rate_limit::RateLimiter;
use crate::error::{RalphError, Result};
use crate::providers::{AnthropicClient, OpenAiClient, TextClient};
use crate::storage::config::Config;

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Default extended-thinking budget in tokens.
pub const DEFAULT_THINKING_BUDGET: u32 = 10_000;

/// Smallest thinking budget the API accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

// =============================================================================
// Model classification
// =============================================================================

/// Which backend a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExtendedThinking,
    ReasoningEffort,
    Reflection,
}

impl StrategyKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExtendedThinking => "Extended thinking",
            Self::ReasoningEffort => "Reasoning-effort",
            Self::Reflection => "Reflection",
        }
    }
}

/// Coarse model family, decided from the identifier alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Claude 3.7 and Claude 4+ models.
    ClaudeThinking,
    /// Older Claude models.
    Claude,
    /// o1/o3/o4 and gpt-5 models.
    OpenAiReasoning,
    /// Everything else, served over OpenAI-compatible chat completions.
    Other,
}

impl ModelFamily {
    #[must_use]
    pub fn classify(model: &str) -> Self {
        let model = model.trim().to_lowercase();
        let model = model.rsplit('/').next().unwrap_or_default();

        if let Some(rest) = model.strip_prefix("claude-") {
            let thinking = rest.starts_with("3-7")
                || rest.starts_with('4')
                || ["opus-4", "sonnet-4", "haiku-4"]
                    .iter()
                    .any(|family| rest.starts_with(family));
            return if thinking { Self::ClaudeThinking } else { Self::Claude };
        }

        let o_series = model.len() >= 2
            && model.starts_with('o')
            && model[1..].starts_with(|c: char| c.is_ascii_digit());
        if o_series || model.starts_with("gpt-5") {
            return Self::OpenAiReasoning;
        }

        Self::Other
    }

    #[must_use]
    pub const fn provider(self) -> Provider {
        match self {
            Self::ClaudeThinking | Self::Claude => Provider::Anthropic,
            Self::OpenAiReasoning | Self::Other => Provider::OpenAi,
        }
    }
}

// =============================================================================
// Factory inputs
// =============================================================================

/// Transport settings shared by every strategy the factory builds.
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    pub http: Client,
    pub anthropic_base: String,
    pub openai_base: String,
    pub timeout: Duration,
    pub limiter: Option<Arc<RateLimiter>>,
}

impl StrategyOptions {
    /// Default API bases and no rate limiter.
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self {
            http,
            anthropic_base: Provider::Anthropic.default_api_base().to_string(),
            openai_base: Provider::OpenAi.default_api_base().to_string(),
            timeout: DEFAULT_TIMEOUT,
            limiter: None,
        }
    }

    /// Options from configuration, with a fresh HTTP client.
    ///
    /// Every HTTP request is capped at `[general] timeout_seconds`; the
    /// request's own timeout bounds each reasoning round trip on top of that.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.general.http_timeout();
        Ok(Self {
            http: build_client(timeout)?,
            anthropic_base: config.providers.api_base(Provider::Anthropic),
            openai_base: config.providers.api_base(Provider::OpenAi),
            timeout,
            limiter: None,
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, provider: Provider, base: impl Into<String>) -> Self {
        match provider {
            Provider::Anthropic => self.anthropic_base = base.into(),
            Provider::OpenAi => self.openai_base = base.into(),
        }
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    fn anthropic(&self, key: &str) -> AnthropicClient {
        let client = AnthropicClient::new(self.http.clone(), &self.anthropic_base, key, self.timeout);
        match &self.limiter {
            Some(limiter) => client.with_limiter(Arc::clone(limiter)),
            None => client,
        }
    }

    fn openai(&self, key: &str) -> OpenAiClient {
        let client = OpenAiClient::new(self.http.clone(), &self.openai_base, key, self.timeout);
        match &self.limiter {
            Some(limiter) => client.with_limiter(Arc::clone(limiter)),
            None => client,
        }
    }
}

// =============================================================================
// Strategy
// =============================================================================

#[derive(Debug, Clone)]
pub enum ReasoningStrategy {
    ExtendedThinking(ExtendedThinkingStrategy),
    ReasoningEffort(ReasoningEffortStrategy),
    Reflection(ReflectionStrategy),
}

impl ReasoningStrategy {
    /// Pick a strategy for `model`.
    ///
    /// Returns `None` when the credential the model needs is missing.
    #[must_use]
    pub fn for_model(model: &str, credentials: &Credentials, options: &StrategyOptions) -> Option<Self> {
        let family = ModelFamily::classify(model);
        let key = credentials.api_key(family.provider())?;

        let strategy = match family {
            ModelFamily::ClaudeThinking => {
                Self::ExtendedThinking(ExtendedThinkingStrategy::new(options.anthropic(key)))
            }
            ModelFamily::OpenAiReasoning => {
                Self::ReasoningEffort(ReasoningEffortStrategy::new(options.openai(key)))
            }
            ModelFamily::Claude => {
                Self::Reflection(ReflectionStrategy::new(TextClient::Anthropic(options.anthropic(key))))
            }
            ModelFamily::Other => {
                Self::Reflection(ReflectionStrategy::new(TextClient::OpenAi(options.openai(key))))
            }
        };
        tracing::debug!(model, kind = ?strategy.kind(), "selected reasoning strategy");
        Some(strategy)
    }

    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::ExtendedThinking(_) => StrategyKind::ExtendedThinking,
            Self::ReasoningEffort(_) => StrategyKind::ReasoningEffort,
            Self::Reflection(_) => StrategyKind::Reflection,
        }
    }

    /// Produce a proposal. Never fails.
    pub async fn generate(&self, request: &ReasoningRequest) -> ReasoningResult {
        match self {
            Self::ExtendedThinking(strategy) => strategy.generate(request).await,
            Self::ReasoningEffort(strategy) => strategy.generate(request).await,
            Self::Reflection(strategy) => strategy.generate(request).await,
        }
    }
}

/// Select a strategy for `request.model` and run it.
///
/// Resolves to a degraded result naming the missing provider when no
/// strategy can be built.
pub async fn generate_proposal(
    request: &ReasoningRequest,
    credentials: &Credentials,
    options: &StrategyOptions,
) -> ReasoningResult {
    match ReasoningStrategy::for_model(&request.model, credentials, options) {
        Some(strategy) => strategy.generate(request).await,
        None => {
            tracing::warn!(model = %request.model, "no reasoning provider configured");
            ReasoningResult::no_provider(request)
        }
    }
}

/// Bound one round trip by `timeout`.
async fn bounded<T>(
    provider: Provider,
    timeout: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| RalphError::Timeout { provider, timeout })?
}
