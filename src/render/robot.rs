//! Robot-mode output (JSON and Markdown).
//!
//! Provides stable, token-efficient output for AI agents.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::storage::prd_lock::{LockStatus, WriteOutcome};
use crate::ultrathink::ReasoningResult;
use crate::util::time::format_timestamp;

/// Schema identifier carried by every JSON envelope.
pub const SCHEMA_VERSION: &str = "ralph.v1";

/// Envelope for JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            command: command.into(),
            data,
        }
    }
}

/// Render any serializable envelope as JSON.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };
    Ok(json)
}

/// Render a reasoning result as Markdown.
#[must_use]
pub fn render_reasoning_md(result: &ReasoningResult) -> String {
    let mut out = String::from("## Ultrathink proposal\n\n");
    let _ = writeln!(out, "- model: {}", result.model);
    let _ = writeln!(out, "- extended_thinking: {}", result.used_extended_thinking);
    let _ = writeln!(out, "- duration_ms: {}", result.duration_ms);
    if let Some(usage) = &result.token_usage {
        let _ = writeln!(out, "- input_tokens: {}", usage.input_tokens);
        let _ = writeln!(out, "- output_tokens: {}", usage.output_tokens);
        if let Some(thinking) = usage.thinking_tokens {
            let _ = writeln!(out, "- thinking_tokens: {thinking}");
        }
    }
    let _ = write!(
        out,
        "\n### Reasoning\n\n{}\n\n### Proposal\n\n{}\n",
        result.reasoning_summary, result.final_proposal
    );
    out
}

/// Render a write outcome as Markdown.
#[must_use]
pub fn render_write_md(outcome: &WriteOutcome) -> String {
    let mut out = format!("## PRD write: {}\n\n", outcome.path.display());
    let _ = writeln!(out, "- success: {}", outcome.success);
    let _ = writeln!(out, "- retries_used: {}", outcome.retries_used);
    if let Some(at) = outcome.lock_acquired_at {
        let _ = writeln!(out, "- lock_acquired_at: {}", format_timestamp(at));
    }
    if let Some(at) = outcome.write_completed_at {
        let _ = writeln!(out, "- write_completed_at: {}", format_timestamp(at));
    }
    if let Some(error) = &outcome.error {
        let _ = writeln!(out, "- error: {error}");
    }
    out
}

/// Render lock status as Markdown.
#[must_use]
pub fn render_status_md(status: &LockStatus) -> String {
    format!(
        "## PRD lock: {}\n\n- locked: {}\n- queue_depth: {}\n",
        status.path.display(),
        status.locked,
        status.queue_depth
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ultrathink::TokenUsage;

    fn result() -> ReasoningResult {
        ReasoningResult {
            final_proposal: "Use a FIFO mutex.".into(),
            reasoning_summary: "Considered contention.".into(),
            used_extended_thinking: true,
            model: "claude-sonnet-4-5".into(),
            metadata: None,
            token_usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
                thinking_tokens: None,
            }),
            duration_ms: 1200,
        }
    }

    #[test]
    fn envelope_carries_schema_version() {
        let json = render_json(&RobotOutput::new("ultrathink", result()), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
        assert_eq!(value["command"], "ultrathink");
        assert_eq!(value["data"]["finalProposal"], "Use a FIFO mutex.");
    }

    #[test]
    fn markdown_lists_usage_and_sections() {
        let md = render_reasoning_md(&result());
        assert!(md.contains("- output_tokens: 20"));
        assert!(!md.contains("thinking_tokens"));
        assert!(md.contains("### Proposal\n\nUse a FIFO mutex."));
    }

    #[test]
    fn status_markdown() {
        let status = LockStatus {
            path: "/tmp/prd.md".into(),
            locked: true,
            queue_depth: 2,
        };
        let md = render_status_md(&status);
        assert!(md.contains("- locked: true"));
        assert!(md.contains("- queue_depth: 2"));
    }
}
