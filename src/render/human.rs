//! Human-readable terminal output.

use std::fmt::Write as _;

use crate::storage::prd_lock::{LockStatus, WriteOutcome};
use crate::ultrathink::ReasoningResult;
use crate::util::format::format_tokens;
use crate::util::time::{format_duration, format_timestamp};

/// Render a reasoning result.
#[must_use]
pub fn render_reasoning(result: &ReasoningResult) -> String {
    let mut out = String::new();
    let mode = if result.used_extended_thinking {
        "deep reasoning"
    } else {
        "standard approach"
    };
    let _ = writeln!(
        out,
        "Ultrathink ({}, {mode}) in {}",
        result.model,
        format_duration(std::time::Duration::from_millis(result.duration_ms))
    );

    if let Some(usage) = &result.token_usage {
        let _ = write!(
            out,
            "Tokens: {} in / {} out",
            format_tokens(usage.input_tokens),
            format_tokens(usage.output_tokens)
        );
        if let Some(thinking) = usage.thinking_tokens {
            let _ = write!(out, " / {} reasoning", format_tokens(thinking));
        }
        out.push('\n');
    }

    let _ = write!(
        out,
        "\nReasoning:\n  {}\n\nProposal:\n{}\n",
        result.reasoning_summary,
        indent(&result.final_proposal)
    );
    out
}

/// Render a write outcome.
#[must_use]
pub fn render_write(outcome: &WriteOutcome) -> String {
    if outcome.success {
        let mut out = format!("Wrote {}", outcome.path.display());
        if outcome.retries_used > 0 {
            let _ = write!(out, " after {} lock retr", outcome.retries_used);
            out.push_str(if outcome.retries_used == 1 { "y" } else { "ies" });
        }
        if let Some(at) = outcome.write_completed_at {
            let _ = write!(out, " at {}", format_timestamp(at));
        }
        out.push('\n');
        out
    } else {
        format!(
            "Failed to write {}: {}\n",
            outcome.path.display(),
            outcome.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Render lock status.
#[must_use]
pub fn render_status(status: &LockStatus) -> String {
    let state = if status.locked { "locked" } else { "unlocked" };
    format!(
        "{}: {state}, {} waiting\n",
        status.path.display(),
        status.queue_depth
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
