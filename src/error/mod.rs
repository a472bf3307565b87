//! Error types for ralph.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into six main categories:
//! - **Authentication**: Missing provider credentials
//! - **Network**: Connection failures and timeouts
//! - **Configuration**: Config file parsing, validation, or bad arguments
//! - **Provider**: Rate limits, breaker refusals, API errors, bad payloads
//! - **Lock**: PRD lock timeouts and atomic write failures
//! - **Internal**: Unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `RALPH-P001`) for programmatic handling.

pub mod suggestions;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::provider::Provider;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Provider credentials are missing.
    Authentication,
    /// Connection failures and timeouts.
    Network,
    /// Config file or argument problems.
    Configuration,
    /// Rate limits, open circuits, provider API errors.
    Provider,
    /// PRD lock contention and file replacement failures.
    Lock,
    /// Bugs, unexpected state, unclassified.
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Provider => "Provider error",
            Self::Lock => "Lock error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Network => "N",
            Self::Configuration => "C",
            Self::Provider => "P",
            Self::Lock => "L",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `ralph` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Bad configuration, arguments or provider payloads
    ParseError = 3,
    /// Timeout (network or lock acquisition)
    Timeout = 4,
    /// Provider refused or throttled the call
    Unavailable = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for ralph operations.
#[derive(Error, Debug)]
pub enum RalphError {
    // ==========================================================================
    // Authentication errors
    // ==========================================================================
    /// No API key is available for a provider.
    #[error("no credentials configured for {provider} (set {env_var})")]
    CredentialsMissing {
        provider: Provider,
        env_var: &'static str,
    },

    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Request timed out.
    #[error("request to {provider} timed out after {}ms", timeout.as_millis())]
    Timeout { provider: Provider, timeout: Duration },

    /// Connection-level failure.
    #[error("network error talking to {provider}: {message}")]
    Network { provider: Provider, message: String },

    // ==========================================================================
    // Provider errors
    // ==========================================================================
    /// Provider answered 429.
    #[error("rate limited by {provider}: {message}")]
    RateLimited {
        provider: Provider,
        retry_after: Option<Duration>,
        message: String,
    },

    /// Provider answered with a non-2xx status other than 429.
    #[error("{provider} API error (HTTP {status_code}): {message}")]
    ProviderApiError {
        provider: Provider,
        status_code: u16,
        message: String,
    },

    /// The circuit breaker refused the call without contacting the provider.
    #[error("circuit open for {provider}; call refused without a network attempt")]
    CircuitOpen { provider: Provider },

    /// Every retry attempt hit a rate limit.
    #[error("{provider}: exhausted retries after {attempts} attempt(s)")]
    RetriesExhausted { provider: Provider, attempts: u32 },

    /// Response body did not match the expected shape.
    #[error("failed to parse {provider} response: {message}")]
    ParseResponse { provider: Provider, message: String },

    // ==========================================================================
    // Lock errors
    // ==========================================================================
    /// Timed out waiting for the PRD lock.
    #[error("timed out acquiring lock on {} after {attempts} attempt(s) ({timeout_ms}ms each)", path.display())]
    LockTimeout {
        path: PathBuf,
        timeout_ms: u64,
        attempts: u32,
    },

    /// Atomic temp-file write failed.
    #[error("atomic write to {} failed: {source}", path.display())]
    AtomicWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The temp file and the target live on different filesystems.
    #[error("refusing cross-filesystem rename into {}", path.display())]
    CrossDeviceRename { path: PathBuf },

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error parsing a configuration file.
    #[error("config parse error at {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Unknown provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    /// Unknown reasoning effort level.
    #[error("invalid reasoning effort '{0}' (expected low, medium or high)")]
    InvalidEffort(String),

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RalphError {
    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_)
            | Self::ConfigParse { .. }
            | Self::InvalidProvider(_)
            | Self::InvalidEffort(_)
            | Self::ParseResponse { .. }
            | Self::CredentialsMissing { .. } => ExitCode::ParseError,

            Self::Timeout { .. } | Self::LockTimeout { .. } => ExitCode::Timeout,

            Self::RateLimited { .. } | Self::CircuitOpen { .. } | Self::RetriesExhausted { .. } => {
                ExitCode::Unavailable
            }

            Self::Network { .. }
            | Self::ProviderApiError { .. }
            | Self::AtomicWrite { .. }
            | Self::CrossDeviceRename { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::CredentialsMissing { .. } => ErrorCategory::Authentication,

            Self::Timeout { .. } | Self::Network { .. } => ErrorCategory::Network,

            Self::Config(_)
            | Self::ConfigParse { .. }
            | Self::InvalidProvider(_)
            | Self::InvalidEffort(_) => ErrorCategory::Configuration,

            Self::RateLimited { .. }
            | Self::ProviderApiError { .. }
            | Self::CircuitOpen { .. }
            | Self::RetriesExhausted { .. }
            | Self::ParseResponse { .. } => ErrorCategory::Provider,

            Self::LockTimeout { .. } | Self::AtomicWrite { .. } | Self::CrossDeviceRename { .. } => {
                ErrorCategory::Lock
            }

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `RALPH-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CredentialsMissing { .. } => "RALPH-A001",

            Self::Timeout { .. } => "RALPH-N001",
            Self::Network { .. } => "RALPH-N099",

            Self::ConfigParse { .. } => "RALPH-C001",
            Self::Config(_) => "RALPH-C002",
            Self::InvalidProvider(_) => "RALPH-C010",
            Self::InvalidEffort(_) => "RALPH-C011",

            Self::RateLimited { .. } => "RALPH-P001",
            Self::ProviderApiError { .. } => "RALPH-P002",
            Self::CircuitOpen { .. } => "RALPH-P003",
            Self::RetriesExhausted { .. } => "RALPH-P004",
            Self::ParseResponse { .. } => "RALPH-P020",

            Self::LockTimeout { .. } => "RALPH-L001",
            Self::AtomicWrite { .. } => "RALPH-L002",
            Self::CrossDeviceRename { .. } => "RALPH-L003",

            Self::Io(_) => "RALPH-X001",
            Self::Json(_) => "RALPH-X002",
            Self::Other(_) => "RALPH-X099",
        }
    }

    /// Returns whether the error is potentially recoverable by retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Network { .. }
                | Self::RateLimited { .. }
                | Self::LockTimeout { .. }
        )
    }

    /// Whether this error is a provider rate-limit response.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether this error is a PRD lock acquisition timeout.
    #[must_use]
    pub const fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Returns the retry-after duration if this error specifies one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns the provider if this error is provider-specific.
    #[must_use]
    pub const fn provider(&self) -> Option<Provider> {
        match self {
            Self::CredentialsMissing { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Network { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::ProviderApiError { provider, .. }
            | Self::CircuitOpen { provider }
            | Self::RetriesExhausted { provider, .. }
            | Self::ParseResponse { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::CredentialsMissing { provider, env_var } => {
                suggestions::credentials_missing_suggestions(*provider, env_var)
            }
            Self::Timeout { provider, timeout } => {
                suggestions::timeout_suggestions(*provider, *timeout)
            }
            Self::Network { provider, message } => {
                suggestions::network_suggestions(*provider, message)
            }
            Self::RateLimited {
                provider,
                retry_after,
                ..
            } => suggestions::rate_limited_suggestions(*provider, *retry_after),
            Self::CircuitOpen { provider } | Self::RetriesExhausted { provider, .. } => {
                suggestions::circuit_open_suggestions(*provider)
            }
            Self::ProviderApiError {
                provider,
                status_code,
                message,
            } => suggestions::provider_api_error_suggestions(*provider, *status_code, message),
            Self::LockTimeout { path, .. } => suggestions::lock_timeout_suggestions(path),
            Self::CrossDeviceRename { path } => suggestions::cross_device_suggestions(path),
            Self::ConfigParse { path, message } => {
                suggestions::config_parse_suggestions(path, message)
            }
            Self::Config(msg) => vec![FixSuggestion::new(
                vec!["ralph config show".to_string()],
                format!("Configuration error: {msg}"),
            )],
            Self::InvalidEffort(_) => vec![FixSuggestion::new(
                vec!["ralph ultrathink --effort high --title <TITLE>".to_string()],
                "Reasoning effort must be one of: low, medium, high.",
            )],
            Self::InvalidProvider(name) => vec![FixSuggestion::new(
                Vec::new(),
                format!("Unknown provider '{name}'. Known providers: anthropic, openai."),
            )],
            Self::ParseResponse { .. }
            | Self::AtomicWrite { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => Vec::new(),
        }
    }
}

/// Result type alias for ralph operations.
pub type Result<T> = std::result::Result<T, RalphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable_and_carries_retry_after() {
        let err = RalphError::RateLimited {
            provider: Provider::Anthropic,
            retry_after: Some(Duration::from_secs(3)),
            message: "slow down".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(err.error_code(), "RALPH-P001");
        assert_eq!(err.category(), ErrorCategory::Provider);
        assert_eq!(err.exit_code(), ExitCode::Unavailable);
    }

    #[test]
    fn lock_timeout_message_names_path_and_attempts() {
        let err = RalphError::LockTimeout {
            path: PathBuf::from("/tmp/prd.json"),
            timeout_ms: 50,
            attempts: 4,
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/prd.json"));
        assert!(message.contains("4 attempt"));
        assert!(err.is_lock_timeout());
        assert_eq!(err.category(), ErrorCategory::Lock);
        assert_eq!(err.exit_code(), ExitCode::Timeout);
    }

    #[test]
    fn retries_exhausted_names_provider_and_attempts() {
        let err = RalphError::RetriesExhausted {
            provider: Provider::OpenAi,
            attempts: 6,
        };
        assert_eq!(err.to_string(), "openai: exhausted retries after 6 attempt(s)");
        assert_eq!(err.provider(), Some(Provider::OpenAi));
    }

    #[test]
    fn api_errors_are_not_retryable() {
        let err = RalphError::ProviderApiError {
            provider: Provider::Anthropic,
            status_code: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_rate_limited());
        assert!(err.retry_after().is_none());
    }

    #[test]
    fn error_codes_carry_category_prefix() {
        let errors = [
            RalphError::CircuitOpen {
                provider: Provider::OpenAi,
            },
            RalphError::Config("x".to_string()),
            RalphError::CrossDeviceRename {
                path: PathBuf::from("a"),
            },
        ];
        for err in &errors {
            let expected = format!("RALPH-{}", err.category().code_prefix());
            assert!(
                err.error_code().starts_with(&expected),
                "{} should start with {expected}",
                err.error_code()
            );
        }
    }

    #[test]
    fn credentials_missing_suggests_env_var() {
        let err = RalphError::CredentialsMissing {
            provider: Provider::Anthropic,
            env_var: "ANTHROPIC_API_KEY",
        };
        let suggestions = err.fix_suggestions();
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].commands.iter().any(|c| c.contains("ANTHROPIC_API_KEY")));
    }
}
