//! Per-provider admission control.
//!
//! A [`RateLimiter`] combines three mechanisms for each [`Provider`]:
//!
//! - a token bucket sized from conservative defaults and recalibrated from
//!   live response headers,
//! - a circuit breaker that opens after repeated rate-limit responses,
//! - full-jitter exponential backoff between retries.
//!
//! All per-provider state sits behind one synchronous mutex. No lock is held
//! across an `.await`; sleeping happens in [`RateLimiter::execute`] after the
//! guard is dropped.

pub mod backoff;
pub mod bucket;
pub mod circuit;
mod execute;
pub mod headers;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::events::{Observer, ObserverSlot};
use crate::core::provider::Provider;
use crate::storage::config::Config;

pub use bucket::TokenBucket;
pub use circuit::{Admission, CircuitBreaker, CircuitPolicy, CircuitState};
pub use execute::{ExecuteFailure, ExecuteHooks, ExecuteOutcome, looks_rate_limited};
pub use headers::ProviderBudget;

// =============================================================================
// Policy
// =============================================================================

/// Rate limiter policy. Also the `[rate_limit]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub failure_threshold: u32,
    pub failure_window_ms: u64,
    pub reset_timeout_ms: u64,
    pub half_open_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 6,
            failure_threshold: 5,
            failure_window_ms: 60_000,
            reset_timeout_ms: 120_000,
            half_open_requests: 1,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub const fn circuit_policy(&self) -> CircuitPolicy {
        CircuitPolicy {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::from_millis(self.failure_window_ms),
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            half_open_requests: self.half_open_requests,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events emitted by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitEvent {
    /// A call was rate limited and will be retried after `delay`.
    RateLimitHit {
        provider: Provider,
        attempt: u32,
        delay: Duration,
    },
    /// The breaker opened.
    CircuitOpen {
        provider: Provider,
        /// Rate-limit failures inside the window when it tripped.
        failures: usize,
    },
    /// The reset timeout elapsed; trial calls are allowed.
    CircuitHalfOpen { provider: Provider },
    /// Trial calls succeeded; normal operation resumed.
    CircuitClosed { provider: Provider },
    /// The caller flagged the provider unusable.
    DegradedMode { provider: Provider, reason: String },
    /// A call succeeded after an earlier rate limit, or a degraded flag was
    /// cleared.
    RateLimitRecovered { provider: Provider },
}

impl RateLimitEvent {
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::RateLimitHit { provider, .. }
            | Self::CircuitOpen { provider, .. }
            | Self::CircuitHalfOpen { provider }
            | Self::CircuitClosed { provider }
            | Self::DegradedMode { provider, .. }
            | Self::RateLimitRecovered { provider } => *provider,
        }
    }

    fn log(&self) {
        match self {
            Self::RateLimitHit {
                provider,
                attempt,
                delay,
            } => tracing::warn!(
                provider = %provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "rate limited, backing off"
            ),
            Self::CircuitOpen { provider, failures } => tracing::warn!(
                provider = %provider,
                failures,
                state = %CircuitState::Open,
                "circuit opened"
            ),
            Self::CircuitHalfOpen { provider } => tracing::info!(
                provider = %provider,
                state = %CircuitState::HalfOpen,
                "circuit half-open, allowing trial calls"
            ),
            Self::CircuitClosed { provider } => tracing::info!(
                provider = %provider,
                state = %CircuitState::Closed,
                "circuit closed"
            ),
            Self::DegradedMode { provider, reason } => {
                tracing::warn!(provider = %provider, reason = %reason, "provider degraded");
            }
            Self::RateLimitRecovered { provider } => {
                tracing::info!(provider = %provider, "provider recovered");
            }
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Read-only snapshot of one provider's limiter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    pub circuit_state: CircuitState,
    pub tokens: f64,
    pub capacity: f64,
    pub refill_per_sec: f64,
    pub rate_limit_failures: usize,
    pub budget: Option<ProviderBudget>,
    pub degraded_reason: Option<String>,
}

// =============================================================================
// Limiter
// =============================================================================

/// A call slot claimed from the breaker.
///
/// Dropping an unsettled half-open permit gives the trial slot back, so a
/// cancelled `execute` future cannot pin the circuit half-open.
#[must_use]
struct CallPermit<'a> {
    limiter: &'a RateLimiter,
    provider: Provider,
    probe_epoch: Option<u64>,
}

impl CallPermit<'_> {
    /// The call produced an outcome that will be recorded on the breaker.
    fn settle(&mut self) {
        self.probe_epoch = None;
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if let Some(epoch) = self.probe_epoch.take() {
            self.limiter.release_probe(self.provider, epoch);
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderState {
    bucket: TokenBucket,
    breaker: CircuitBreaker,
    budget: Option<ProviderBudget>,
}

impl ProviderState {
    fn seeded(provider: Provider, now: Instant) -> Self {
        Self {
            bucket: TokenBucket::per_minute(provider.default_requests_per_minute(), now),
            breaker: CircuitBreaker::new(now),
            budget: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    providers: HashMap<Provider, ProviderState>,
    degraded: HashMap<Provider, String>,
}

impl Inner {
    fn state(&mut self, provider: Provider, now: Instant) -> &mut ProviderState {
        self.providers
            .entry(provider)
            .or_insert_with(|| ProviderState::seeded(provider, now))
    }
}

/// Per-provider token bucket, circuit breaker and backoff.
///
/// Share across tasks with `Arc<RateLimiter>`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: Mutex<Inner>,
    observer: ObserverSlot<RateLimitEvent>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            observer: ObserverSlot::empty(),
        }
    }

    /// Limiter that reports every event to `observer`.
    #[must_use]
    pub fn with_observer(config: RateLimitConfig, observer: Observer<RateLimitEvent>) -> Self {
        Self {
            observer: ObserverSlot::new(observer),
            ..Self::new(config)
        }
    }

    /// Limiter using the `[rate_limit]` section of a loaded config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rate_limit.clone())
    }

    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: &RateLimitEvent) {
        event.log();
        self.observer.emit(event);
    }

    /// Seed a closed circuit and a default-sized bucket. Idempotent.
    pub fn init_provider(&self, provider: Provider) {
        let now = Instant::now();
        self.lock().state(provider, now);
    }

    /// Apply live rate-limit headers.
    ///
    /// Returns the parsed budget, or `None` when no recognized header was
    /// present (in which case nothing changes).
    pub fn update_from_headers(
        &self,
        provider: Provider,
        headers: &HeaderMap,
    ) -> Option<ProviderBudget> {
        let budget = headers::parse_budget(provider, headers, chrono::Utc::now())?;
        let now = Instant::now();
        {
            let mut inner = self.lock();
            let state = inner.state(provider, now);
            state
                .bucket
                .recalibrate(budget.requests_limit, budget.requests_remaining, now);
            state.budget = Some(budget.clone());
        }
        tracing::debug!(
            provider = %provider,
            requests_limit = ?budget.requests_limit,
            requests_remaining = ?budget.requests_remaining,
            tokens_remaining = ?budget.tokens_remaining,
            "rate-limit budget updated"
        );
        Some(budget)
    }

    /// Take a token if one is available.
    ///
    /// `None` means the call is admitted; otherwise the exact time until a
    /// token will be available.
    pub fn should_wait(&self, provider: Provider) -> Option<Duration> {
        let now = Instant::now();
        self.lock().state(provider, now).bucket.try_acquire(now)
    }

    /// Current breaker state. Moves `open` to `half_open` once the reset
    /// timeout has elapsed.
    pub fn circuit_state(&self, provider: Provider) -> CircuitState {
        let policy = self.config.circuit_policy();
        let now = Instant::now();
        let (state, transitioned) = {
            let mut inner = self.lock();
            let breaker = &mut inner.state(provider, now).breaker;
            let transitioned = breaker.refresh(&policy, now);
            (breaker.state(), transitioned)
        };
        if transitioned.is_some() {
            self.emit(&RateLimitEvent::CircuitHalfOpen { provider });
        }
        state
    }

    /// Refresh the breaker and claim a call slot.
    ///
    /// `None` means the circuit refused the call. A half-open trial slot is
    /// returned when the permit drops without being settled.
    fn admit(&self, provider: Provider) -> Option<CallPermit<'_>> {
        let policy = self.config.circuit_policy();
        let now = Instant::now();
        let (admission, transitioned) = {
            let mut inner = self.lock();
            let breaker = &mut inner.state(provider, now).breaker;
            let transitioned = breaker.refresh(&policy, now);
            (breaker.admit(&policy), transitioned)
        };
        if transitioned.is_some() {
            self.emit(&RateLimitEvent::CircuitHalfOpen { provider });
        }
        admission.map(|admission| CallPermit {
            limiter: self,
            provider,
            probe_epoch: match admission {
                Admission::Probe { epoch } => Some(epoch),
                Admission::Normal => None,
            },
        })
    }

    fn release_probe(&self, provider: Provider, epoch: u64) {
        let released = self
            .lock()
            .providers
            .get_mut(&provider)
            .is_some_and(|state| state.breaker.release_probe(epoch));
        if released {
            tracing::debug!(provider = %provider, "trial call abandoned, slot released");
        }
    }

    /// Record a failed call.
    ///
    /// Only rate-limit failures count toward the threshold; while half-open
    /// any failure reopens the circuit.
    pub fn record_failure(&self, provider: Provider, is_rate_limit: bool) {
        let policy = self.config.circuit_policy();
        let now = Instant::now();
        let (opened, failures) = {
            let mut inner = self.lock();
            let breaker = &mut inner.state(provider, now).breaker;
            let opened = breaker.record_failure(&policy, is_rate_limit, now);
            (opened, breaker.rate_limit_failures())
        };
        tracing::debug!(provider = %provider, is_rate_limit, failures, "failure recorded");
        if opened.is_some() {
            self.emit(&RateLimitEvent::CircuitOpen { provider, failures });
        }
    }

    /// Record a successful call. Only acts while half-open.
    pub fn record_success(&self, provider: Provider) {
        let policy = self.config.circuit_policy();
        let now = Instant::now();
        let closed = self
            .lock()
            .state(provider, now)
            .breaker
            .record_success(&policy, now);
        if closed.is_some() {
            self.emit(&RateLimitEvent::CircuitClosed { provider });
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn calculate_backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        backoff::full_jitter(
            attempt,
            retry_after,
            self.config.base_delay(),
            self.config.max_delay(),
        )
    }

    /// Flag a provider unusable. Not consulted by [`Self::execute`].
    pub fn mark_degraded(&self, provider: Provider, reason: impl Into<String>) {
        let reason = reason.into();
        self.lock().degraded.insert(provider, reason.clone());
        self.emit(&RateLimitEvent::DegradedMode { provider, reason });
    }

    pub fn clear_degraded(&self, provider: Provider) {
        let was_degraded = self.lock().degraded.remove(&provider).is_some();
        if was_degraded {
            self.emit(&RateLimitEvent::RateLimitRecovered { provider });
        }
    }

    #[must_use]
    pub fn is_degraded(&self, provider: Provider) -> bool {
        self.lock().degraded.contains_key(&provider)
    }

    #[must_use]
    pub fn degraded_reason(&self, provider: Provider) -> Option<String> {
        self.lock().degraded.get(&provider).cloned()
    }

    /// Forget breaker, bucket and budget for one provider. The degraded flag
    /// is kept.
    pub fn reset(&self, provider: Provider) {
        self.lock().providers.remove(&provider);
        tracing::info!(provider = %provider, "rate limiter reset");
    }

    /// Forget everything, including degraded flags.
    pub fn reset_all(&self) {
        let mut inner = self.lock();
        inner.providers.clear();
        inner.degraded.clear();
        drop(inner);
        tracing::info!("rate limiter reset for all providers");
    }

    /// Snapshot for diagnostics. Never creates or mutates state.
    #[must_use]
    pub fn status(&self, provider: Provider) -> ProviderStatus {
        let policy = self.config.circuit_policy();
        let now = Instant::now();
        let inner = self.lock();
        let mut state = inner
            .providers
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderState::seeded(provider, now));
        state.breaker.refresh(&policy, now);

        ProviderStatus {
            provider,
            circuit_state: state.breaker.state(),
            tokens: state.bucket.available(now),
            capacity: state.bucket.capacity(),
            refill_per_sec: state.bucket.refill_per_sec(),
            rate_limit_failures: state.breaker.rate_limit_failures(),
            budget: state.budget,
            degraded_reason: inner.degraded.get(&provider).cloned(),
        }
    }
}
