//! Integration tests for the per-provider rate limiter.
//!
//! All tests run on paused tokio time, so backoff sleeps and breaker
//! timeouts complete instantly and deterministically.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use common::log_capture::TestLogCapture;
use ralph::RalphError;
use ralph::core::http::ApiResponse;
use ralph::core::provider::Provider;
use ralph::core::rate_limit::{
    CircuitState, ExecuteFailure, ExecuteHooks, RateLimitConfig, RateLimitEvent, RateLimiter,
};
use ralph::test_utils::{
    EventRecorder, fast_rate_limit_config, make_anthropic_headers, make_openai_headers,
    make_rate_limited_error,
};

fn ok_response(headers: reqwest::header::HeaderMap) -> ApiResponse<()> {
    ApiResponse {
        status: 200,
        headers,
        body: (),
    }
}

#[tokio::test(start_paused = true)]
async fn circuit_opens_after_five_rate_limits_and_recovers() {
    let recorder = EventRecorder::new();
    let config = RateLimitConfig {
        max_attempts: 1,
        ..RateLimitConfig::default()
    };
    let limiter = RateLimiter::with_observer(config.clone(), recorder.observer());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let calls = AtomicU32::new(0);

    for round in 1..=5 {
        let outcome = limiter
            .execute(
                Provider::Anthropic,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(make_rate_limited_error(Provider::Anthropic)) }
                },
                &hooks,
            )
            .await;
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.hit_rate_limit);
        assert_eq!(outcome.circuit_open, round == 5, "round {round}");
    }
    assert_eq!(limiter.circuit_state(Provider::Anthropic), CircuitState::Open);

    // The sixth call is refused without reaching the network.
    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ok_response(reqwest::header::HeaderMap::new())) }
            },
            &hooks,
        )
        .await;
    assert!(outcome.circuit_open);
    assert_eq!(outcome.attempts, 0);
    assert!(matches!(
        outcome.result,
        Err(ExecuteFailure::CircuitOpen {
            provider: Provider::Anthropic
        })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    tokio::time::advance(Duration::from_millis(config.reset_timeout_ms)).await;
    assert_eq!(
        limiter.circuit_state(Provider::Anthropic),
        CircuitState::HalfOpen
    );

    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || async { Ok(ok_response(reqwest::header::HeaderMap::new())) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
    assert_eq!(limiter.circuit_state(Provider::Anthropic), CircuitState::Closed);

    let events = recorder.events();
    assert_eq!(
        events,
        vec![
            RateLimitEvent::CircuitOpen {
                provider: Provider::Anthropic,
                failures: 5
            },
            RateLimitEvent::CircuitHalfOpen {
                provider: Provider::Anthropic
            },
            RateLimitEvent::CircuitClosed {
                provider: Provider::Anthropic
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_trial_call_reopens_circuit() {
    let limiter = RateLimiter::new(fast_rate_limit_config());
    for _ in 0..3 {
        limiter.record_failure(Provider::OpenAi, true);
    }
    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(limiter.circuit_state(Provider::OpenAi), CircuitState::HalfOpen);

    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || async {
                Err(RalphError::ProviderApiError {
                    provider: Provider::OpenAi,
                    status_code: 500,
                    message: "overloaded".to_string(),
                })
            },
            &hooks,
        )
        .await;
    assert!(matches!(outcome.result, Err(ExecuteFailure::Call(_))));
    assert_eq!(limiter.circuit_state(Provider::OpenAi), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn rate_limits_are_retried_with_backoff_events() {
    let recorder = EventRecorder::new();
    let limiter = RateLimiter::with_observer(fast_rate_limit_config(), recorder.observer());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let calls = AtomicU32::new(0);

    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(make_rate_limited_error(Provider::OpenAi))
                    } else {
                        Ok(ok_response(reqwest::header::HeaderMap::new()))
                    }
                }
            },
            &hooks,
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.hit_rate_limit);
    assert!(!outcome.circuit_open);

    let events = recorder.events();
    let hits: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RateLimitEvent::RateLimitHit { attempt, delay, .. } => Some((*attempt, *delay)),
            _ => None,
        })
        .collect();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].0, 1);
    assert_eq!(hits[1].0, 2);
    assert!(hits[0].1 <= Duration::from_millis(10));
    assert!(hits[1].1 <= Duration::from_millis(20));
    assert_eq!(outcome.total_delay, hits[0].1 + hits[1].1);
    assert!(matches!(
        events.last(),
        Some(RateLimitEvent::RateLimitRecovered {
            provider: Provider::OpenAi
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_convert_to_retries_exhausted() {
    let limiter = RateLimiter::new(RateLimitConfig {
        failure_threshold: 10,
        ..fast_rate_limit_config()
    });
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();

    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || async { Err(make_rate_limited_error(Provider::Anthropic)) },
            &hooks,
        )
        .await;
    assert_eq!(outcome.attempts, 3);
    assert!(!outcome.circuit_open);

    let err = RalphError::from(outcome.into_result().unwrap_err());
    assert!(matches!(
        err,
        RalphError::RetriesExhausted {
            provider: Provider::Anthropic,
            attempts: 3
        }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_overrides_jitter() {
    let recorder = EventRecorder::new();
    let limiter = RateLimiter::with_observer(
        RateLimitConfig {
            max_attempts: 2,
            ..fast_rate_limit_config()
        },
        recorder.observer(),
    );
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let calls = AtomicU32::new(0);

    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RalphError::RateLimited {
                            provider: Provider::Anthropic,
                            retry_after: Some(Duration::from_secs(3)),
                            message: "slow down".to_string(),
                        })
                    } else {
                        Ok(ok_response(reqwest::header::HeaderMap::new()))
                    }
                }
            },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
    assert_eq!(outcome.total_delay, Duration::from_secs(3));
    assert!(recorder.events().contains(&RateLimitEvent::RateLimitHit {
        provider: Provider::Anthropic,
        attempt: 1,
        delay: Duration::from_secs(3),
    }));
}

#[tokio::test(start_paused = true)]
async fn response_headers_recalibrate_the_bucket() {
    let limiter = RateLimiter::new(fast_rate_limit_config());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();

    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || async { Ok(ok_response(make_openai_headers(60, 0))) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());

    let status = limiter.status(Provider::OpenAi);
    assert!((status.capacity - 60.0).abs() < f64::EPSILON);
    assert_eq!(status.budget.unwrap().requests_remaining, Some(0));

    // One token per second at 60 rpm; the next call waits for it.
    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || async { Ok(ok_response(reqwest::header::HeaderMap::new())) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
    assert!(outcome.total_delay >= Duration::from_millis(900));
    assert!(outcome.total_delay <= Duration::from_millis(1_100));
}

#[tokio::test(start_paused = true)]
async fn anthropic_headers_recalibrate_the_bucket() {
    let limiter = RateLimiter::new(fast_rate_limit_config());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();

    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || async { Ok(ok_response(make_anthropic_headers(30, 0))) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());

    let status = limiter.status(Provider::Anthropic);
    assert!((status.capacity - 30.0).abs() < f64::EPSILON);
    assert!((status.refill_per_sec - 0.5).abs() < 1e-9);
    let budget = status.budget.unwrap();
    assert_eq!(budget.requests_limit, Some(30));
    assert_eq!(budget.requests_remaining, Some(0));
    assert!(budget.requests_reset.is_some());

    // Half a token per second; the next call waits about two seconds.
    let outcome = limiter
        .execute(
            Provider::Anthropic,
            || async { Ok(ok_response(reqwest::header::HeaderMap::new())) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
    assert!(outcome.total_delay >= Duration::from_millis(1_900));
    assert!(outcome.total_delay <= Duration::from_millis(2_100));
}

#[tokio::test(start_paused = true)]
async fn cancelled_trial_call_leaves_the_circuit_usable() {
    let recorder = EventRecorder::new();
    let config = RateLimitConfig {
        failure_threshold: 1,
        reset_timeout_ms: 1_000,
        ..fast_rate_limit_config()
    };
    let limiter = RateLimiter::with_observer(config, recorder.observer());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let calls = AtomicU32::new(0);

    limiter.record_failure(Provider::OpenAi, true);
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let slow = limiter.execute(
        Provider::OpenAi,
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ok_response(reqwest::header::HeaderMap::new()))
            }
        },
        &hooks,
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(50), slow)
            .await
            .is_err()
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(3 * 60 * 60)).await;
    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ok_response(reqwest::header::HeaderMap::new())) }
            },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
    assert!(!outcome.circuit_open);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(limiter.circuit_state(Provider::OpenAi), CircuitState::Closed);
    assert!(
        recorder
            .events()
            .contains(&RateLimitEvent::CircuitClosed {
                provider: Provider::OpenAi
            })
    );
}

#[test]
fn backoff_never_exceeds_its_exponential_ceiling() {
    let config = RateLimitConfig {
        base_delay_ms: 100,
        max_delay_ms: 5_000,
        ..RateLimitConfig::default()
    };
    let limiter = RateLimiter::new(config);
    for attempt in 0..12u32 {
        let ceiling = Duration::from_millis((100u64 << attempt).min(5_000));
        for _ in 0..50 {
            assert!(limiter.calculate_backoff_delay(attempt, None) <= ceiling);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn providers_do_not_share_breakers() {
    let limiter = RateLimiter::new(fast_rate_limit_config());
    for _ in 0..3 {
        limiter.record_failure(Provider::Anthropic, true);
    }
    assert_eq!(limiter.circuit_state(Provider::Anthropic), CircuitState::Open);

    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();
    let outcome = limiter
        .execute(
            Provider::OpenAi,
            || async { Ok(ok_response(reqwest::header::HeaderMap::new())) },
            &hooks,
        )
        .await;
    assert!(outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn breaker_transitions_reach_the_log() {
    let logs = TestLogCapture::start();
    let limiter = RateLimiter::new(fast_rate_limit_config());
    let hooks = ExecuteHooks::<ApiResponse<()>, RalphError>::api_responses();

    limiter
        .execute(
            Provider::OpenAi,
            || async { Err(make_rate_limited_error(Provider::OpenAi)) },
            &hooks,
        )
        .await;

    logs.assert_logged_at_level(tracing::Level::WARN, "rate limited, backing off");
    logs.assert_logged_at_level(tracing::Level::WARN, "circuit opened");
    logs.assert_field_logged("provider", "openai");
    assert_eq!(logs.count("circuit opened"), 1);
}
