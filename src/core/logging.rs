//! Diagnostic logging to stderr (or a file).
//!
//! Rate limiter transitions, lock retries and reasoning calls are all
//! reported through `tracing`; this module wires up the subscriber.
//!
//! The level for the `ralph` target comes from, highest first: the
//! `--log-level` flag, `RALPH_LOG`, `[general] log_level` in the config file,
//! then `warn`. `RUST_LOG` replaces the whole filter when set.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::util::env::env_non_empty;

pub const LOG_LEVEL_ENV: &str = "RALPH_LOG";
pub const LOG_FORMAT_ENV: &str = "RALPH_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "RALPH_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" | "jsonl" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Verbosity of the `ralph` target, most verbose first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Directive value for [`EnvFilter`].
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Level named by `RALPH_LOG`, if it parses.
#[must_use]
pub fn parse_log_level_from_env() -> Option<LogLevel> {
    env_non_empty(LOG_LEVEL_ENV).and_then(|value| LogLevel::from_arg(&value))
}

/// Parse log format from `RALPH_LOG_FORMAT`.
#[must_use]
pub fn parse_log_format_from_env() -> Option<LogFormat> {
    env_non_empty(LOG_FORMAT_ENV).and_then(|value| LogFormat::from_arg(&value))
}

/// Parse log file path from `RALPH_LOG_FILE`.
#[must_use]
pub fn parse_log_file_from_env() -> Option<PathBuf> {
    env_non_empty(LOG_FILE_ENV).map(PathBuf::from)
}

/// Effective level from the flag, `RALPH_LOG` and the config file value.
///
/// A value that does not parse is skipped in favour of the next source.
#[must_use]
pub fn resolve_log_level(cli: Option<&str>, config: Option<&str>) -> LogLevel {
    pick_level(cli, parse_log_level_from_env(), config)
}

fn pick_level(cli: Option<&str>, env: Option<LogLevel>, config: Option<&str>) -> LogLevel {
    cli.and_then(LogLevel::from_arg)
        .or(env)
        .or_else(|| config.and_then(LogLevel::from_arg))
        .unwrap_or_default()
}

fn open_log_file(path: &Path) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Install the global subscriber.
///
/// `verbose` raises the level to at least `debug`. An unwritable
/// `log_file` falls back to stderr. Calling this more than once is a no-op
/// after the first subscriber is installed.
pub fn init(level: LogLevel, format: LogFormat, log_file: Option<PathBuf>, verbose: bool) {
    let level = if verbose {
        level.min(LogLevel::Debug)
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ralph={}", level.as_filter())));
    let writer = log_file
        .as_deref()
        .and_then(open_log_file)
        .map_or_else(|| BoxMakeWriter::new(std::io::stderr), BoxMakeWriter::new);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    let installed = match format {
        LogFormat::Json => builder
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .try_init(),
        LogFormat::Compact => builder.compact().with_target(true).try_init(),
        LogFormat::Human => builder.with_target(false).without_time().try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(level = level.as_filter(), ?format, "logging initialized");
    }
}
