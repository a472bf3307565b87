//! Provider transport clients.
//!
//! Each provider has its own submodule wrapping its HTTP API. Both clients
//! optionally route every round trip through a shared [`RateLimiter`].

pub mod anthropic;
pub mod openai;

use std::future::Future;
use std::time::Duration;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

pub use crate::core::provider::Provider;

use crate::core::http::ApiResponse;
use crate::core::rate_limit::{ExecuteHooks, RateLimiter};
use crate::error::{RalphError, Result};

/// Plain text produced by a single non-reasoning round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Either provider, used where any plain chat completion will do.
#[derive(Debug, Clone)]
pub enum TextClient {
    Anthropic(AnthropicClient),
    OpenAi(OpenAiClient),
}

impl TextClient {
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Anthropic(_) => Provider::Anthropic,
            Self::OpenAi(_) => Provider::OpenAi,
        }
    }

    /// Single-turn completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the underlying client.
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<Completion> {
        match self {
            Self::Anthropic(client) => client.complete(model, system, prompt, max_tokens).await,
            Self::OpenAi(client) => client.complete(model, system, prompt, max_tokens).await,
        }
    }

    /// Per-request timeout of the underlying client.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match self {
            Self::Anthropic(client) => client.timeout(),
            Self::OpenAi(client) => client.timeout(),
        }
    }
}

/// Run one API round trip, through `limiter` when one is attached.
///
/// A refusal or exhausted retry budget comes back as the equivalent
/// [`RalphError`].
pub(crate) async fn dispatch<T, F, Fut>(
    provider: Provider,
    limiter: Option<&RateLimiter>,
    mut call: F,
) -> Result<ApiResponse<T>>
where
    T: 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse<T>>>,
{
    let Some(limiter) = limiter else {
        return call().await;
    };
    let hooks = ExecuteHooks::api_responses();
    let outcome = limiter.execute(provider, call, &hooks).await;
    if outcome.attempts > 1 {
        tracing::debug!(
            provider = %provider,
            attempts = outcome.attempts,
            delay_ms = outcome.total_delay.as_millis() as u64,
            "request needed retries"
        );
    }
    outcome.into_result().map_err(RalphError::from)
}

/// Join the base URL and an API path without doubling slashes.
pub(crate) fn endpoint(api_base: &str, path: &str) -> String {
    format!("{}{}", api_base.trim_end_matches('/'), path)
}
