//! Retry loop that drives a remote call through the limiter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use thiserror::Error;

use super::{CircuitState, RateLimitEvent, RateLimiter};
use crate::core::http::ApiResponse;
use crate::core::provider::Provider;
use crate::error::RalphError;

pub type HeaderExtractor<T> = Box<dyn Fn(&T) -> Option<HeaderMap> + Send + Sync>;
pub type RateLimitClassifier<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
pub type RetryAfterHint<E> = Box<dyn Fn(&E) -> Option<Duration> + Send + Sync>;

/// Caller-supplied hooks for [`RateLimiter::execute`]. Every hook is
/// optional.
pub struct ExecuteHooks<T, E> {
    /// Headers to feed into [`RateLimiter::update_from_headers`] on success.
    pub extract_headers: Option<HeaderExtractor<T>>,
    /// Whether an error is a rate-limit response. Defaults to
    /// [`looks_rate_limited`].
    pub is_rate_limit: Option<RateLimitClassifier<E>>,
    /// Server-provided wait before the next attempt.
    pub retry_after: Option<RetryAfterHint<E>>,
}

impl<T, E> Default for ExecuteHooks<T, E> {
    fn default() -> Self {
        Self {
            extract_headers: None,
            is_rate_limit: None,
            retry_after: None,
        }
    }
}

impl<T, E> ExecuteHooks<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header_extractor(
        mut self,
        f: impl Fn(&T) -> Option<HeaderMap> + Send + Sync + 'static,
    ) -> Self {
        self.extract_headers = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_rate_limit_classifier(mut self, f: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_rate_limit = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_retry_after(
        mut self,
        f: impl Fn(&E) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.retry_after = Some(Box::new(f));
        self
    }
}

impl<T: 'static> ExecuteHooks<ApiResponse<T>, RalphError> {
    /// Hooks for calls made through [`crate::core::http::send_json`].
    #[must_use]
    pub fn api_responses() -> Self {
        Self::new()
            .with_header_extractor(|response: &ApiResponse<T>| Some(response.headers.clone()))
            .with_rate_limit_classifier(RalphError::is_rate_limited)
            .with_retry_after(RalphError::retry_after)
    }
}

/// Default rate-limit heuristic on an error's display text.
#[must_use]
pub fn looks_rate_limited<E: Display + ?Sized>(err: &E) -> bool {
    let text = err.to_string().to_lowercase();
    ["429", "rate limit", "rate_limit", "too many requests"]
        .iter()
        .any(|needle| text.contains(needle))
}

/// Why [`RateLimiter::execute`] gave up.
#[derive(Debug, Error)]
pub enum ExecuteFailure<E> {
    /// Refused up front; `call` never ran.
    #[error("circuit open for {provider}")]
    CircuitOpen { provider: Provider },
    /// A non-rate-limit error. Not retried.
    #[error("{0}")]
    Call(E),
    /// A rate-limit failure tripped the breaker mid-retry.
    #[error("circuit opened for {provider} after rate limiting: {last}")]
    CircuitTripped { provider: Provider, last: E },
    /// Every attempt was rate limited.
    #[error("{provider}: exhausted retries after {attempts} attempt(s): {last}")]
    Exhausted {
        provider: Provider,
        attempts: u32,
        last: E,
    },
}

impl From<ExecuteFailure<RalphError>> for RalphError {
    fn from(failure: ExecuteFailure<RalphError>) -> Self {
        match failure {
            ExecuteFailure::CircuitOpen { provider }
            | ExecuteFailure::CircuitTripped { provider, .. } => Self::CircuitOpen { provider },
            ExecuteFailure::Call(err) => err,
            ExecuteFailure::Exhausted {
                provider, attempts, ..
            } => Self::RetriesExhausted { provider, attempts },
        }
    }
}

/// Everything [`RateLimiter::execute`] observed.
#[derive(Debug)]
pub struct ExecuteOutcome<T, E> {
    pub result: Result<T, ExecuteFailure<E>>,
    /// Times `call` was invoked.
    pub attempts: u32,
    /// Bucket waits plus backoff sleeps.
    pub total_delay: Duration,
    pub hit_rate_limit: bool,
    pub circuit_open: bool,
}

impl<T, E> ExecuteOutcome<T, E> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Drop the bookkeeping and keep the result.
    ///
    /// # Errors
    ///
    /// Returns the failure when the call did not succeed.
    pub fn into_result(self) -> Result<T, ExecuteFailure<E>> {
        self.result
    }
}

impl RateLimiter {
    /// Run `call` with admission control, retries and breaker bookkeeping.
    ///
    /// Never panics and never returns early through `?`: every path ends in
    /// an [`ExecuteOutcome`]. Dropping the future mid-call is safe; a
    /// half-open trial slot it held is handed back.
    pub async fn execute<T, E, F, Fut>(
        &self,
        provider: Provider,
        mut call: F,
        hooks: &ExecuteHooks<T, E>,
    ) -> ExecuteOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(mut permit) = self.admit(provider) else {
            tracing::warn!(provider = %provider, "circuit open, refusing call");
            return ExecuteOutcome {
                result: Err(ExecuteFailure::CircuitOpen { provider }),
                attempts: 0,
                total_delay: Duration::ZERO,
                hit_rate_limit: false,
                circuit_open: true,
            };
        };

        let mut total_delay = Duration::ZERO;
        while let Some(wait) = self.should_wait(provider) {
            tracing::debug!(
                provider = %provider,
                delay_ms = wait.as_millis() as u64,
                "waiting for rate-limit token"
            );
            tokio::time::sleep(wait).await;
            total_delay += wait;
        }

        let max_attempts = self.config().max_attempts.max(1);
        let mut hit_rate_limit = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = call().await;
            permit.settle();
            let err = match result {
                Ok(value) => {
                    if let Some(headers) = hooks.extract_headers.as_ref().and_then(|f| f(&value)) {
                        self.update_from_headers(provider, &headers);
                    }
                    self.record_success(provider);
                    if hit_rate_limit {
                        self.emit(&RateLimitEvent::RateLimitRecovered { provider });
                    }
                    return ExecuteOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        total_delay,
                        hit_rate_limit,
                        circuit_open: false,
                    };
                }
                Err(err) => err,
            };

            let rate_limited = hooks
                .is_rate_limit
                .as_ref()
                .map_or_else(|| looks_rate_limited(&err), |f| f(&err));

            if !rate_limited {
                self.record_failure(provider, false);
                tracing::debug!(provider = %provider, attempt, error = %err, "call failed");
                return ExecuteOutcome {
                    result: Err(ExecuteFailure::Call(err)),
                    attempts: attempt,
                    total_delay,
                    hit_rate_limit,
                    circuit_open: false,
                };
            }

            hit_rate_limit = true;
            self.record_failure(provider, true);

            if self.circuit_state(provider) == CircuitState::Open {
                return ExecuteOutcome {
                    result: Err(ExecuteFailure::CircuitTripped {
                        provider,
                        last: err,
                    }),
                    attempts: attempt,
                    total_delay,
                    hit_rate_limit,
                    circuit_open: true,
                };
            }

            if attempt >= max_attempts {
                tracing::warn!(provider = %provider, attempts = attempt, "retries exhausted");
                return ExecuteOutcome {
                    result: Err(ExecuteFailure::Exhausted {
                        provider,
                        attempts: attempt,
                        last: err,
                    }),
                    attempts: attempt,
                    total_delay,
                    hit_rate_limit,
                    circuit_open: false,
                };
            }

            let hint = hooks.retry_after.as_ref().and_then(|f| f(&err));
            let delay = self.calculate_backoff_delay(attempt - 1, hint);
            self.emit(&RateLimitEvent::RateLimitHit {
                provider,
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
            total_delay += delay;
        }
    }
}
