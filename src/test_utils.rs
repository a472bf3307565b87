//! Test utilities for ralph.
//!
//! Provides shared helpers, test data factories, and assertion macros
//! for use across all test modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ralph::test_utils::*;
//!
//! let dir = TestDir::new();
//! let prd = dir.prd_path();
//! let recorder = EventRecorder::new();
//! let limiter = RateLimiter::with_observer(fast_rate_limit_config(), recorder.observer());
//! ```

use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::core::events::Observer;
use crate::core::provider::Provider;
use crate::core::rate_limit::RateLimitConfig;
use crate::error::RalphError;
use crate::storage::prd_lock::PrdLockConfig;
use crate::ultrathink::{ReasoningRequest, SearchSnippet};

/// File name used for PRD documents in tests.
pub const TEST_PRD_NAME: &str = "prd.md";

// =============================================================================
// Policy Factories
// =============================================================================

/// Rate-limit policy with millisecond delays and a small breaker threshold.
///
/// - base delay 10ms, max delay 100ms, 3 attempts
/// - opens after 3 rate-limit failures within 1s
/// - half-open after 200ms, closes after 1 success
#[must_use]
pub fn fast_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        base_delay_ms: 10,
        max_delay_ms: 100,
        max_attempts: 3,
        failure_threshold: 3,
        failure_window_ms: 1_000,
        reset_timeout_ms: 200,
        half_open_requests: 1,
    }
}

/// Lock policy with short waits for contention tests.
#[must_use]
pub fn fast_prd_lock_config() -> PrdLockConfig {
    PrdLockConfig {
        base_delay_ms: 5,
        max_retries: 2,
        acquire_timeout_ms: 50,
    }
}

// =============================================================================
// Header Factories
// =============================================================================

/// Build a `HeaderMap` from name/value pairs.
///
/// # Panics
///
/// Panics on an invalid header name or value.
#[must_use]
pub fn make_headers(pairs: &[(&str, &str)]) -> HeaderMap {
    pairs
        .iter()
        .map(|(name, value)| {
            (
                HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
                HeaderValue::from_str(value).expect("valid header value"),
            )
        })
        .collect()
}

/// Anthropic-style request budget headers.
#[must_use]
pub fn make_anthropic_headers(limit: u32, remaining: u32) -> HeaderMap {
    let (limit, remaining) = (limit.to_string(), remaining.to_string());
    make_headers(&[
        ("anthropic-ratelimit-requests-limit", limit.as_str()),
        ("anthropic-ratelimit-requests-remaining", remaining.as_str()),
        ("anthropic-ratelimit-requests-reset", "2026-01-01T00:01:00Z"),
    ])
}

/// OpenAI-style request budget headers.
#[must_use]
pub fn make_openai_headers(limit: u32, remaining: u32) -> HeaderMap {
    let (limit, remaining) = (limit.to_string(), remaining.to_string());
    make_headers(&[
        ("x-ratelimit-limit-requests", limit.as_str()),
        ("x-ratelimit-remaining-requests", remaining.as_str()),
        ("x-ratelimit-reset-requests", "1s"),
    ])
}

/// A 429 error as `send_json` would produce it.
#[must_use]
pub fn make_rate_limited_error(provider: Provider) -> RalphError {
    RalphError::RateLimited {
        provider,
        retry_after: None,
        message: "rate limit exceeded".to_string(),
    }
}

// =============================================================================
// Request Factories
// =============================================================================

/// A reasoning request with a description, two concerns and one search hit.
#[must_use]
pub fn make_test_reasoning_request(model: &str) -> ReasoningRequest {
    ReasoningRequest::new("Add retry to the PRD writer", model)
        .with_description("Concurrent sessions occasionally lose PRD edits.")
        .with_concerns(["Writes can interleave", "Retries may starve one session"])
        .with_search_results(vec![SearchSnippet {
            title: "Atomic file replacement".to_string(),
            url: "https://example.com/atomic-rename".to_string(),
            snippet: "Write to a temporary file, fsync, then rename over the target.".to_string(),
        }])
}

/// Sample config TOML touching every section.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
timeout_seconds = 30
log_level = "info"

[rate_limit]
base_delay_ms = 250
max_attempts = 4

[prd_lock]
acquire_timeout_ms = 2000

[ultrathink]
model = "o3-mini"
effort = "medium"

[providers.openai]
api_base = "http://127.0.0.1:9/"
"#
    .to_string()
}

// =============================================================================
// Event Recorder
// =============================================================================

/// Collects every event passed to its observer.
pub struct EventRecorder<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E: Clone + Send + 'static> EventRecorder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An observer that appends to this recorder.
    #[must_use]
    pub fn observer(&self) -> Observer<E> {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &E| {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        })
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Clone + Send + 'static> Default for EventRecorder<E> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Temp Directory Utilities
// =============================================================================

/// A temporary directory for tests with automatic cleanup.
///
/// Creates an isolated directory that is automatically deleted when
/// the `TestDir` is dropped. Uses the `tempfile` crate internally.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Path of the PRD document inside this directory (not created).
    #[must_use]
    pub fn prd_path(&self) -> PathBuf {
        self.file_path(TEST_PRD_NAME)
    }

    /// Create a file in the temporary directory with the given content.
    ///
    /// Creates parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inner.path().join(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
        path
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    /// Check if a file exists in the temporary directory.
    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    /// Get the full path to a file in the temporary directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }

    /// Names of leftover `.tmp` files from atomic writes.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be listed.
    #[must_use]
    pub fn temp_files(&self) -> Vec<String> {
        fs::read_dir(self.inner.path())
            .expect("Failed to list test directory")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string is valid JSON and return the parsed value.
#[macro_export]
macro_rules! assert_json_valid {
    ($json:expr) => {{
        let json = $json;
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(value) => value,
            Err(e) => panic!(
                "Expected valid JSON, but parsing failed: {}\n\nJSON string:\n{}",
                e, json
            ),
        }
    }};
}
