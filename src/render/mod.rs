//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use crate::cli::args::OutputFormat;
use crate::error::Result;
use crate::storage::prd_lock::{LockStatus, WriteOutcome};
use crate::ultrathink::ReasoningResult;

use robot::RobotOutput;

/// Render an ultrathink result.
///
/// # Errors
///
/// Returns error if JSON serialization fails.
pub fn render_reasoning(
    result: &ReasoningResult,
    format: OutputFormat,
    pretty: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_reasoning(result)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("ultrathink", result), pretty),
        OutputFormat::Md => Ok(robot::render_reasoning_md(result)),
    }
}

/// Render a PRD write outcome.
///
/// # Errors
///
/// Returns error if JSON serialization fails.
pub fn render_write(outcome: &WriteOutcome, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_write(outcome)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("prd write", outcome), pretty),
        OutputFormat::Md => Ok(robot::render_write_md(outcome)),
    }
}

/// Render PRD lock status.
///
/// # Errors
///
/// Returns error if JSON serialization fails.
pub fn render_status(status: &LockStatus, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_status(status)),
        OutputFormat::Json => robot::render_json(&RobotOutput::new("prd status", status), pretty),
        OutputFormat::Md => Ok(robot::render_status_md(status)),
    }
}
