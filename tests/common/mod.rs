//! Shared helpers for integration tests.
//!
//! Data factories live in `ralph::test_utils`; this module only holds
//! tracing capture, which needs a subscriber scoped to the test thread.

pub mod log_capture;
