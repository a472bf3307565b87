//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{RalphError, Result};
use crate::storage::config::{ResolvedUltrathink, UltrathinkOverrides};
use crate::ultrathink::ReasoningRequest;

/// Ralph - resilience and coordination for paired coding sessions.
#[derive(Parser, Debug)]
#[command(name = "ralph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a deeply-reasoned tie-breaking proposal
    Ultrathink(UltrathinkArgs),

    /// Read or write the shared PRD under its lock
    #[command(subcommand)]
    Prd(PrdCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Arguments for the `ultrathink` command.
#[derive(Parser, Debug)]
pub struct UltrathinkArgs {
    /// Task title
    #[arg(long)]
    pub title: String,

    /// Task description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Reviewer concern (repeatable)
    #[arg(long = "concern", value_name = "TEXT")]
    pub concerns: Vec<String>,

    /// Model identifier
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Extended-thinking budget in tokens
    #[arg(long, value_name = "TOKENS")]
    pub budget: Option<u32>,

    /// Reasoning effort (low, medium, high)
    #[arg(long, value_name = "LEVEL")]
    pub effort: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl UltrathinkArgs {
    /// Validate argument combinations.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::Config`] for a blank title or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(RalphError::Config("--title must not be empty".to_string()));
        }
        if self.timeout == Some(0) {
            return Err(RalphError::Config(
                "--timeout must be greater than 0 seconds".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn overrides(&self) -> UltrathinkOverrides {
        UltrathinkOverrides {
            model: self.model.clone(),
            timeout_seconds: self.timeout,
            thinking_budget: self.budget,
            effort: self.effort.clone(),
        }
    }

    /// Build the reasoning request from these arguments and resolved settings.
    #[must_use]
    pub fn request(&self, resolved: &ResolvedUltrathink) -> ReasoningRequest {
        ReasoningRequest::new(self.title.trim(), &resolved.model)
            .with_description(self.description.trim())
            .with_concerns(self.concerns.iter().filter(|c| !c.trim().is_empty()).cloned())
            .with_timeout(resolved.timeout)
            .with_thinking_budget(resolved.thinking_budget)
            .with_effort(resolved.effort)
    }
}

/// PRD subcommands.
#[derive(Subcommand, Debug)]
pub enum PrdCommand {
    /// Atomically replace the PRD (content from --content, --from, or stdin)
    Write {
        /// PRD file path
        path: PathBuf,

        /// New content
        #[arg(long, conflicts_with = "from")]
        content: Option<String>,

        /// Read new content from this file
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Print the PRD, read under the lock
    Read {
        /// PRD file path
        path: PathBuf,
    },

    /// Show lock state for a PRD path
    Status {
        /// PRD file path
        path: PathBuf,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Markdown output
    Md,
}
