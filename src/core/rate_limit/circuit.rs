//! Per-provider circuit breaker driven by rate-limit failures.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are refused without touching the network.
    Open,
    /// A limited number of trial calls are let through.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Thresholds governing transitions.
#[derive(Debug, Clone, Copy)]
pub struct CircuitPolicy {
    pub failure_threshold: u32,
    pub failure_window: Duration,
    pub reset_timeout: Duration,
    pub half_open_requests: u32,
}

/// How [`CircuitBreaker::admit`] let a call through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed circuit; nothing to give back.
    Normal,
    /// A half-open trial slot, valid only while the breaker is still in the
    /// half-open period identified by `epoch`.
    Probe { epoch: u64 },
}

/// Epochs are unique per process, so a breaker rebuilt by a reset never
/// reuses one.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy)]
struct Failure {
    at: Instant,
    rate_limited: bool,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failures: VecDeque<Failure>,
    last_transition: Instant,
    half_open_successes: u32,
    probes_in_flight: u32,
    epoch: u64,
}

impl CircuitBreaker {
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            last_transition: now,
            half_open_successes: 0,
            probes_in_flight: 0,
            epoch: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        self.state = to;
        self.last_transition = now;
        self.half_open_successes = 0;
        self.probes_in_flight = 0;
        self.epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
    }

    /// Current state, moving `open -> half_open` once the reset timeout has
    /// elapsed. Returns the new state when a transition happened.
    pub fn refresh(&mut self, policy: &CircuitPolicy, now: Instant) -> Option<CircuitState> {
        if self.state == CircuitState::Open
            && now.saturating_duration_since(self.last_transition) >= policy.reset_timeout
        {
            self.transition(CircuitState::HalfOpen, now);
            return Some(CircuitState::HalfOpen);
        }
        None
    }

    #[must_use]
    pub const fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a new call may proceed. While half-open at most
    /// `half_open_requests` trial calls are outstanding at once.
    pub fn admit(&mut self, policy: &CircuitPolicy) -> Option<Admission> {
        match self.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                if self.probes_in_flight < policy.half_open_requests.max(1) {
                    self.probes_in_flight += 1;
                    Some(Admission::Probe { epoch: self.epoch })
                } else {
                    None
                }
            }
        }
    }

    /// Hand back a trial slot whose call never reported an outcome.
    ///
    /// A no-op once the breaker has left the half-open period the slot was
    /// taken in. Returns whether a slot was freed.
    pub fn release_probe(&mut self, epoch: u64) -> bool {
        if self.state == CircuitState::HalfOpen && self.epoch == epoch && self.probes_in_flight > 0 {
            self.probes_in_flight -= 1;
            return true;
        }
        false
    }

    fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(front) = self.failures.front() {
            if now.saturating_duration_since(front.at) > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of rate-limit failures still inside the window.
    #[must_use]
    pub fn rate_limit_failures(&self) -> usize {
        self.failures.iter().filter(|f| f.rate_limited).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Record a failed call. Returns `Some(Open)` when this failure tripped
    /// the breaker.
    pub fn record_failure(
        &mut self,
        policy: &CircuitPolicy,
        is_rate_limit: bool,
        now: Instant,
    ) -> Option<CircuitState> {
        self.failures.push_back(Failure {
            at: now,
            rate_limited: is_rate_limit,
        });
        self.prune(policy.failure_window, now);

        match self.state {
            CircuitState::HalfOpen => {
                self.transition(CircuitState::Open, now);
                Some(CircuitState::Open)
            }
            CircuitState::Closed
                if is_rate_limit
                    && self.rate_limit_failures() >= policy.failure_threshold as usize =>
            {
                self.transition(CircuitState::Open, now);
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }

    /// Record a successful call. Returns `Some(Closed)` when enough trial
    /// calls succeeded to close the breaker.
    pub fn record_success(&mut self, policy: &CircuitPolicy, now: Instant) -> Option<CircuitState> {
        if self.state != CircuitState::HalfOpen {
            return None;
        }
        self.half_open_successes += 1;
        self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
        if self.half_open_successes >= policy.half_open_requests.max(1) {
            self.transition(CircuitState::Closed, now);
            self.failures.clear();
            return Some(CircuitState::Closed);
        }
        None
    }
}
