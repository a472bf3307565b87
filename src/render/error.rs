//! Error rendering for ralph.
//!
//! Plain text with fix suggestions for terminals, structured JSON for
//! robot formats.

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::{FixSuggestion, RalphError};

// =============================================================================
// Public API
// =============================================================================

/// Render an error for `format`.
///
/// JSON and Markdown both produce structured JSON; Markdown is always
/// pretty-printed.
#[must_use]
pub fn render_error(error: &RalphError, format: OutputFormat, pretty: bool) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        OutputFormat::Md => render_error_json(error, true),
        OutputFormat::Human => render_human(error),
    }
}

/// Render error as structured JSON for machine consumption.
#[must_use]
pub fn render_error_json(error: &RalphError, pretty: bool) -> String {
    let error_json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&error_json)
    } else {
        serde_json::to_string(&error_json)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

// =============================================================================
// Text Rendering
// =============================================================================

fn render_human(error: &RalphError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![render_simple(error)];

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            lines.push(String::new());
            lines.push(first.context.clone());
        }
        if let Some(prevention) = &first.prevention {
            lines.push(format!("Tip: {prevention}"));
        }
        if let Some(url) = &first.doc_url {
            lines.push(format!("Docs: {url}"));
        }
    }

    lines.join("\n")
}

/// Header plus the first runnable command.
fn render_simple(error: &RalphError) -> String {
    let mut lines = vec![format!("Error [{}]: {error}", error.error_code())];
    if let Some(cmd) = first_command(&error.fix_suggestions()) {
        lines.push(format!("Fix: {cmd}"));
    }
    lines.join("\n")
}

fn first_command(suggestions: &[FixSuggestion]) -> Option<&str> {
    suggestions
        .first()?
        .commands
        .iter()
        .map(String::as_str)
        .find(|cmd| !cmd.starts_with('#'))
}

// =============================================================================
// JSON Rendering
// =============================================================================

/// JSON representation of an error for machine consumption.
#[derive(Serialize)]
struct ErrorJson {
    error_code: &'static str,
    category: String,
    message: String,
    is_retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
    suggestions: Vec<SuggestionJson>,
}

#[derive(Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_url: Option<String>,
}

impl ErrorJson {
    fn from_error(error: &RalphError) -> Self {
        Self {
            error_code: error.error_code(),
            category: error.category().to_string(),
            message: error.to_string(),
            is_retryable: error.is_retryable(),
            provider: error.provider().map(|p| p.cli_name().to_string()),
            retry_after_seconds: error.retry_after().map(|d| d.as_secs()),
            suggestions: error
                .fix_suggestions()
                .into_iter()
                .map(|s| SuggestionJson {
                    commands: s.commands,
                    context: s.context,
                    prevention: s.prevention,
                    doc_url: s.doc_url,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::Provider;
    use std::time::Duration;

    #[test]
    fn json_error_has_code_and_retry_hint() {
        let err = RalphError::RateLimited {
            provider: Provider::OpenAi,
            retry_after: Some(Duration::from_secs(30)),
            message: "slow down".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&render_error(&err, OutputFormat::Json, false)).unwrap();
        assert_eq!(value["error_code"], err.error_code());
        assert_eq!(value["provider"], "openai");
        assert_eq!(value["retry_after_seconds"], 30);
        assert_eq!(value["is_retryable"], true);
    }

    #[test]
    fn human_error_shows_fix_command() {
        let err = RalphError::CredentialsMissing {
            provider: Provider::Anthropic,
            env_var: "ANTHROPIC_API_KEY",
        };
        let out = render_error(&err, OutputFormat::Human, false);
        assert!(out.starts_with(&format!("Error [{}]", err.error_code())));
        assert!(out.contains("Fix: "));
    }

    #[test]
    fn markdown_errors_are_pretty_json() {
        let err = RalphError::Config("bad".into());
        let out = render_error(&err, OutputFormat::Md, false);
        assert!(out.contains("\n  \"error_code\""));
    }
}
