//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/ralph/config.toml`
//! - macOS: `~/Library/Application Support/dev.ralph.ralph/config.toml`
//! - Windows: `%APPDATA%/ralph/ralph/config/config.toml`
//!
//! ## Precedence
//!
//! Ultrathink settings are resolved with the following precedence (highest
//! first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `RALPH_CONFIG`: Override config file path
//! - `RALPH_MODEL`: Model identifier for ultrathink
//! - `RALPH_TIMEOUT`: Ultrathink request timeout in seconds

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::logging::LogLevel;
use crate::core::provider::Provider;
use crate::core::rate_limit::RateLimitConfig;
use crate::error::{RalphError, Result};
use crate::storage::prd_lock::PrdLockConfig;
use crate::ultrathink::{MIN_THINKING_BUDGET, ReasoningEffort};
use crate::util::env::env_non_empty;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "RALPH_CONFIG";
/// Environment variable for the ultrathink model.
pub const ENV_MODEL: &str = "RALPH_MODEL";
/// Environment variable for the ultrathink timeout in seconds.
pub const ENV_TIMEOUT: &str = "RALPH_TIMEOUT";

const MAX_TIMEOUT_SECONDS: u64 = 600;

// =============================================================================
// File Configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub rate_limit: RateLimitConfig,
    pub prd_lock: PrdLockConfig,
    pub ultrathink: UltrathinkConfig,
    pub providers: ProvidersConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level below `--log-level` and `RALPH_LOG` (error, warn, info,
    /// debug, trace).
    pub log_level: Option<String>,
    /// Ceiling for any single HTTP request, in seconds.
    pub timeout_seconds: u64,
}

impl GeneralConfig {
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            timeout_seconds: 120,
        }
    }
}

/// Deep-reasoning defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrathinkConfig {
    pub model: String,
    pub thinking_budget: u32,
    /// low, medium or high.
    pub effort: String,
    pub timeout_seconds: u64,
}

impl Default for UltrathinkConfig {
    fn default() -> Self {
        Self {
            model: crate::ultrathink::DEFAULT_MODEL.to_string(),
            thinking_budget: crate::ultrathink::DEFAULT_THINKING_BUDGET,
            effort: ReasoningEffort::default().as_str().to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderSettings,
    pub openai: ProviderSettings,
}

/// Settings for a specific provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Custom API base URL (if different from default).
    pub api_base: Option<String>,
}

impl ProvidersConfig {
    /// API base for `provider`, without a trailing slash.
    #[must_use]
    pub fn api_base(&self, provider: Provider) -> String {
        let settings = match provider {
            Provider::Anthropic => &self.anthropic,
            Provider::OpenAi => &self.openai,
        };
        settings
            .api_base
            .as_deref()
            .unwrap_or_else(|| provider.default_api_base())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Config {
    /// Load configuration, honouring `RALPH_CONFIG`.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::ConfigParse`] if the file exists but is not
    /// valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RalphError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RalphError::Config(format!("failed to serialize config: {e}")))?;

        crate::storage::atomic::write_atomic_sync(path, content.as_bytes())?;
        tracing::debug!(?path, "config file saved");
        Ok(())
    }

    /// Config file path: `RALPH_CONFIG` if set, otherwise the platform
    /// default.
    #[must_use]
    pub fn config_path() -> PathBuf {
        env_non_empty(ENV_CONFIG).map_or_else(|| AppPaths::new().config_file(), PathBuf::from)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        check_timeout("general.timeout_seconds", self.general.timeout_seconds)?;
        check_timeout("ultrathink.timeout_seconds", self.ultrathink.timeout_seconds)?;

        if let Some(level) = self.general.log_level.as_deref()
            && LogLevel::from_arg(level).is_none()
        {
            return Err(RalphError::Config(format!(
                "Invalid general.log_level \"{level}\". Valid values: error, warn, info, debug, trace"
            )));
        }

        if ReasoningEffort::from_arg(&self.ultrathink.effort).is_none() {
            return Err(RalphError::Config(format!(
                "Invalid ultrathink.effort \"{}\". Valid values: low, medium, high",
                self.ultrathink.effort
            )));
        }

        let rl = &self.rate_limit;
        if rl.max_attempts == 0 {
            return Err(RalphError::Config(
                "rate_limit.max_attempts must be at least 1".to_string(),
            ));
        }
        if rl.failure_threshold == 0 {
            return Err(RalphError::Config(
                "rate_limit.failure_threshold must be at least 1".to_string(),
            ));
        }
        if rl.half_open_requests == 0 {
            return Err(RalphError::Config(
                "rate_limit.half_open_requests must be at least 1".to_string(),
            ));
        }
        if rl.base_delay_ms > rl.max_delay_ms {
            return Err(RalphError::Config(
                "rate_limit.base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        if self.prd_lock.acquire_timeout_ms == 0 {
            return Err(RalphError::Config(
                "prd_lock.acquire_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_timeout(key: &str, seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
        return Err(RalphError::Config(format!(
            "{key}: timeout must be between 1 and {MAX_TIMEOUT_SECONDS} seconds"
        )));
    }
    Ok(())
}

// =============================================================================
// Resolved Ultrathink Settings
// =============================================================================

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct UltrathinkOverrides {
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub thinking_budget: Option<u32>,
    pub effort: Option<String>,
}

/// Tracks the source of each resolved value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UltrathinkSources {
    pub model: ConfigSource,
    pub timeout: ConfigSource,
    pub thinking_budget: ConfigSource,
    pub effort: ConfigSource,
}

/// Ultrathink settings after merging CLI, environment and config file.
#[derive(Debug, Clone)]
pub struct ResolvedUltrathink {
    pub model: String,
    pub timeout: Duration,
    pub thinking_budget: u32,
    pub effort: ReasoningEffort,
    pub sources: UltrathinkSources,
}

impl ResolvedUltrathink {
    /// Resolve final settings.
    ///
    /// # Errors
    ///
    /// Returns an error if an effort value is unknown or a timeout is out of
    /// bounds.
    pub fn resolve(config: &Config, overrides: &UltrathinkOverrides) -> Result<Self> {
        let mut sources = UltrathinkSources::default();
        let defaults = UltrathinkConfig::default();

        let model = if let Some(model) = overrides.model.clone() {
            sources.model = ConfigSource::Cli;
            model
        } else if let Some(model) = env_non_empty(ENV_MODEL) {
            sources.model = ConfigSource::Env;
            model
        } else {
            sources.model = source_of(&config.ultrathink.model, &defaults.model);
            config.ultrathink.model.clone()
        };

        let timeout_seconds = if let Some(secs) = overrides.timeout_seconds {
            sources.timeout = ConfigSource::Cli;
            secs
        } else if let Some(secs) = env_non_empty(ENV_TIMEOUT).and_then(|v| v.parse().ok()) {
            sources.timeout = ConfigSource::Env;
            secs
        } else {
            sources.timeout = source_of(
                &config.ultrathink.timeout_seconds,
                &defaults.timeout_seconds,
            );
            config.ultrathink.timeout_seconds
        };
        check_timeout("timeout", timeout_seconds)?;

        let thinking_budget = if let Some(budget) = overrides.thinking_budget {
            sources.thinking_budget = ConfigSource::Cli;
            budget
        } else {
            sources.thinking_budget = source_of(
                &config.ultrathink.thinking_budget,
                &defaults.thinking_budget,
            );
            config.ultrathink.thinking_budget
        };

        let effort_raw = if let Some(effort) = overrides.effort.as_deref() {
            sources.effort = ConfigSource::Cli;
            effort
        } else {
            sources.effort = source_of(&config.ultrathink.effort, &defaults.effort);
            config.ultrathink.effort.as_str()
        };
        let effort = ReasoningEffort::from_arg(effort_raw)
            .ok_or_else(|| RalphError::InvalidEffort(effort_raw.to_string()))?;

        Ok(Self {
            model,
            timeout: Duration::from_secs(timeout_seconds),
            thinking_budget: thinking_budget.max(MIN_THINKING_BUDGET),
            effort,
            sources,
        })
    }
}

fn source_of<T: PartialEq>(value: &T, default: &T) -> ConfigSource {
    if value == default {
        ConfigSource::Default
    } else {
        ConfigSource::ConfigFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Run `f` with `key` set, restoring the prior value afterwards.
    #[allow(unsafe_code)]
    fn with_env(key: &str, value: &str, f: impl FnOnce()) {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let prior = std::env::var(key).ok();
        // SAFETY: serialized by ENV_LOCK.
        unsafe { std::env::set_var(key, value) };
        f();
        match prior {
            Some(v) => unsafe { std::env::set_var(key, v) },
            None => unsafe { std::env::remove_var(key) },
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.max_attempts, 6);
        assert_eq!(config.prd_lock.max_retries, 3);
        assert_eq!(config.ultrathink.thinking_budget, 10_000);
        assert_eq!(config.ultrathink.effort, "high");
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
log_level = "debug"
timeout_seconds = 45

[rate_limit]
failure_threshold = 3
reset_timeout_ms = 5000

[prd_lock]
acquire_timeout_ms = 250

[ultrathink]
model = "o3-mini"
effort = "medium"

[providers.openai]
api_base = "http://localhost:9999/"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.general.http_timeout(), Duration::from_secs(45));
        assert_eq!(config.rate_limit.failure_threshold, 3);
        assert_eq!(config.rate_limit.reset_timeout_ms, 5000);
        assert_eq!(config.rate_limit.max_attempts, 6);
        assert_eq!(config.prd_lock.acquire_timeout_ms, 250);
        assert_eq!(config.prd_lock.base_delay_ms, 100);
        assert_eq!(config.ultrathink.model, "o3-mini");
        assert_eq!(
            config.providers.api_base(Provider::OpenAi),
            "http://localhost:9999"
        );
        assert_eq!(
            config.providers.api_base(Provider::Anthropic),
            "https://api.anthropic.com"
        );
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, RalphError::ConfigParse { .. }));
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.ultrathink.timeout_seconds = 300;
        config.rate_limit.half_open_requests = 2;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.ultrathink.effort = "extreme".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("effort"));

        let mut config = Config::default();
        config.general.timeout_seconds = 0;
        assert!(config.validate().unwrap_err().to_string().contains("between 1 and 600"));

        let mut config = Config::default();
        config.ultrathink.timeout_seconds = 601;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_level = Some("chatty".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("general.log_level"));

        let mut config = Config::default();
        config.rate_limit.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rate_limit.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_defaults_track_default_source() {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if std::env::var(ENV_MODEL).is_ok() || std::env::var(ENV_TIMEOUT).is_ok() {
            return;
        }
        let resolved =
            ResolvedUltrathink::resolve(&Config::default(), &UltrathinkOverrides::default())
                .unwrap();
        assert_eq!(resolved.sources.model, ConfigSource::Default);
        assert_eq!(resolved.effort, ReasoningEffort::High);
        assert_eq!(resolved.timeout, Duration::from_secs(120));
    }

    #[test]
    fn resolve_cli_beats_env_beats_file() {
        let mut config = Config::default();
        config.ultrathink.model = "gpt-4o".to_string();

        with_env(ENV_MODEL, "o3", || {
            let from_env = ResolvedUltrathink::resolve(&config, &UltrathinkOverrides::default())
                .unwrap();
            assert_eq!(from_env.model, "o3");
            assert_eq!(from_env.sources.model, ConfigSource::Env);

            let overrides = UltrathinkOverrides {
                model: Some("claude-opus-4-1".to_string()),
                ..UltrathinkOverrides::default()
            };
            let from_cli = ResolvedUltrathink::resolve(&config, &overrides).unwrap();
            assert_eq!(from_cli.model, "claude-opus-4-1");
            assert_eq!(from_cli.sources.model, ConfigSource::Cli);
        });
    }

    #[test]
    fn resolve_env_timeout() {
        with_env(ENV_TIMEOUT, "45", || {
            let resolved =
                ResolvedUltrathink::resolve(&Config::default(), &UltrathinkOverrides::default())
                    .unwrap();
            assert_eq!(resolved.timeout, Duration::from_secs(45));
            assert_eq!(resolved.sources.timeout, ConfigSource::Env);
        });
    }

    #[test]
    fn resolve_rejects_unknown_effort_and_clamps_budget() {
        let overrides = UltrathinkOverrides {
            effort: Some("max".to_string()),
            ..UltrathinkOverrides::default()
        };
        let err = ResolvedUltrathink::resolve(&Config::default(), &overrides).unwrap_err();
        assert!(matches!(err, RalphError::InvalidEffort(_)));

        let overrides = UltrathinkOverrides {
            thinking_budget: Some(10),
            timeout_seconds: Some(30),
            ..UltrathinkOverrides::default()
        };
        let resolved = ResolvedUltrathink::resolve(&Config::default(), &overrides).unwrap();
        assert_eq!(resolved.thinking_budget, MIN_THINKING_BUDGET);
        assert_eq!(resolved.sources.thinking_budget, ConfigSource::Cli);
    }
}
