//! Fix suggestion database for ralph errors.
//!
//! Provides actionable fix suggestions mapped to specific error types,
//! including commands, context explanations, and prevention tips.

use std::path::Path;
use std::time::Duration;

use crate::core::provider::Provider;

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
///
/// Contains actionable information to help users resolve errors.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Primary fix commands in order of preference.
    /// These should be copy-paste ready for the terminal.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,

    /// Link to documentation for more information.
    pub doc_url: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
            doc_url: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }

    /// Builder: adds documentation URL.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }
}

// =============================================================================
// Suggestion Generators
// =============================================================================

/// Generates fix suggestions for a provider with no API key.
#[must_use]
pub fn credentials_missing_suggestions(provider: Provider, env_var: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![
                format!("export {env_var}=<your key>"),
                format!("# Or store it in the OS keyring under service 'ralph', user '{}'", provider.cli_name()),
            ],
            format!(
                "No API key found for {}. ralph reads {env_var} first and then the OS \
                 keyring unless RALPH_NO_KEYRING is set.",
                provider.display_name()
            ),
        )
        .with_doc_url(provider.docs_url()),
    ]
}

/// Generates fix suggestions for timeout errors.
#[must_use]
pub fn timeout_suggestions(provider: Provider, timeout: Duration) -> Vec<FixSuggestion> {
    let seconds = timeout.as_secs().max(1);
    vec![
        FixSuggestion::new(
            vec![format!(
                "ralph ultrathink --timeout {} --title <TITLE>",
                seconds * 2
            )],
            format!(
                "{} did not respond within {seconds}s. Extended reasoning requests can \
                 run long when the thinking budget is large.",
                provider.display_name()
            ),
        )
        .with_prevention(
            "Raise [ultrathink] timeout_seconds (and [general] timeout_seconds if it \
             is lower) in the config file, or lower the thinking budget.",
        ),
    ]
}

/// Generates fix suggestions for connection-level failures.
#[must_use]
pub fn network_suggestions(provider: Provider, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("curl -sI {}", provider.default_api_base())],
        format!(
            "Could not reach {}: {message}. Check connectivity, proxies, and any \
             api_base override in [providers.{}].",
            provider.display_name(),
            provider.cli_name()
        ),
    )]
}

/// Generates fix suggestions for rate limit errors.
#[must_use]
pub fn rate_limited_suggestions(
    provider: Provider,
    retry_after: Option<Duration>,
) -> Vec<FixSuggestion> {
    let wait = retry_after.map_or_else(
        || "a short while".to_string(),
        |d| format!("{} seconds", d.as_secs()),
    );
    vec![
        FixSuggestion::new(
            vec![format!("sleep {} && ralph ultrathink --title <TITLE>", retry_after.map_or(60, |d| d.as_secs().max(1)))],
            format!(
                "{} is throttling requests. Wait {wait} before retrying.",
                provider.display_name()
            ),
        )
        .with_prevention(
            "Lower [rate_limit] settings or stagger the Executor and Reviewer sessions.",
        ),
    ]
}

/// Generates fix suggestions when the circuit breaker refuses calls.
#[must_use]
pub fn circuit_open_suggestions(provider: Provider) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            Vec::new(),
            format!(
                "Repeated rate-limit responses from {} tripped the circuit breaker. \
                 Calls resume after the reset timeout elapses.",
                provider.display_name()
            ),
        )
        .with_prevention("Tune [rate_limit] failure_threshold and reset_timeout_ms."),
    ]
}

/// Generates fix suggestions for provider API errors.
#[must_use]
pub fn provider_api_error_suggestions(
    provider: Provider,
    status_code: u16,
    message: &str,
) -> Vec<FixSuggestion> {
    let context = match status_code {
        401 | 403 => format!(
            "{} rejected the API key (HTTP {status_code}). Check {}.",
            provider.display_name(),
            provider.api_key_env_var()
        ),
        404 => format!(
            "{} does not know this model or endpoint (HTTP 404): {message}",
            provider.display_name()
        ),
        500..=599 => format!(
            "{} reported a server error (HTTP {status_code}). Try again later.",
            provider.display_name()
        ),
        _ => format!(
            "{} returned HTTP {status_code}: {message}",
            provider.display_name()
        ),
    };
    vec![FixSuggestion::new(Vec::new(), context).with_doc_url(provider.docs_url())]
}

/// Generates fix suggestions for PRD lock timeouts.
#[must_use]
pub fn lock_timeout_suggestions(path: &Path) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!("ralph prd status {}", path.display())],
            format!(
                "Another session held the lock on {} for longer than the acquire \
                 timeout on every retry.",
                path.display()
            ),
        )
        .with_prevention("Raise [prd_lock] acquire_timeout_ms or max_retries."),
    ]
}

/// Generates fix suggestions for cross-filesystem renames.
#[must_use]
pub fn cross_device_suggestions(path: &Path) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        Vec::new(),
        format!(
            "The temp file and {} ended up on different filesystems, so the rename \
             cannot be atomic. Keep the PRD on a regular local directory.",
            path.display()
        ),
    )]
}

/// Generates fix suggestions for config parse errors.
#[must_use]
pub fn config_parse_suggestions(path: &Path, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![
            format!("$EDITOR {}", path.display()),
            "ralph config show".to_string(),
        ],
        format!(
            "The config file at {} could not be parsed: {message}",
            path.display()
        ),
    )
    .with_prevention("Validate TOML syntax after editing the config file.")]
}
