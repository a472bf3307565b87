//! ralph - resilience and coordination core
//!
//! Lets two concurrently-running model sessions share scarce, failure-prone
//! resources safely:
//! - [`core::rate_limit::RateLimiter`]: per-provider token bucket, circuit
//!   breaker and Full-Jitter backoff
//! - [`storage::prd_lock::PrdLock`]: per-path FIFO lock with atomic writes
//!   for the shared task document
//! - [`ultrathink::ReasoningStrategy`]: deep-reasoning tie-breaker over
//!   extended thinking, reasoning effort or reflection

// Note: deny (not forbid) to allow #[allow(unsafe_code)] in test helpers for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod render;
pub mod storage;
pub mod ultrathink;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, RalphError, Result};
