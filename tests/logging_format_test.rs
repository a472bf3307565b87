//! Integration tests for logging initialization.
//!
//! The global subscriber can be installed once per process, so this binary
//! has exactly one test that calls `init`.

use ralph::core::logging::{self, LogFormat, LogLevel};
use ralph::core::provider::Provider;
use ralph::core::rate_limit::RateLimiter;
use ralph::test_utils::TestDir;
use serde_json::Value;

#[test]
fn json_logs_are_written_to_the_log_file() {
    let dir = TestDir::new();
    let log_file = dir.file_path("ralph.jsonl");
    logging::init(LogLevel::Info, LogFormat::Json, Some(log_file), false);
    // Second call is a no-op.
    logging::init(LogLevel::Debug, LogFormat::Human, None, false);

    let limiter = RateLimiter::default();
    limiter.mark_degraded(Provider::OpenAi, "billing hold");
    limiter.clear_degraded(Provider::OpenAi);

    let content = dir.read_file("ralph.jsonl").unwrap();
    let events: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("each log line is JSON"))
        .collect();

    let degraded = events
        .iter()
        .find(|e| e["fields"]["message"] == "provider degraded")
        .expect("degraded event logged");
    assert_eq!(degraded["level"], "WARN");
    assert_eq!(degraded["fields"]["provider"], "openai");
    assert_eq!(degraded["fields"]["reason"], "billing hold");
    assert!(events
        .iter()
        .any(|e| e["fields"]["message"] == "provider recovered"));
}

#[test]
fn formats_and_levels_parse_from_arguments() {
    assert_eq!(LogFormat::from_arg("JSONL"), Some(LogFormat::Json));
    assert_eq!(LogFormat::from_arg("compact"), Some(LogFormat::Compact));
    assert_eq!(LogFormat::from_arg("xml"), None);
    assert_eq!(LogLevel::from_arg("warning"), Some(LogLevel::Warn));
    assert_eq!(LogLevel::from_arg(" Verbose "), Some(LogLevel::Debug));
    assert_eq!(LogLevel::from_arg("crit"), None);
    assert!(LogLevel::Debug < LogLevel::Warn);
}
