//! Provider descriptors.
//!
//! The two hosted model APIs ralph talks to, with the per-provider constants
//! the rate limiter, transport clients and credential lookup need.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RalphError, Result};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[Self::Anthropic, Self::OpenAi];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.cli_name() == lower)
            .copied()
            .ok_or_else(|| RalphError::InvalidProvider(name.to_string()))
    }

    /// Conservative requests-per-minute ceiling used before any live header
    /// has been seen.
    #[must_use]
    pub const fn default_requests_per_minute(self) -> u32 {
        match self {
            Self::Anthropic => 50,
            Self::OpenAi => 60,
        }
    }

    /// Environment variable holding the API key.
    #[must_use]
    pub const fn api_key_env_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Default API base URL (no trailing slash).
    #[must_use]
    pub const fn default_api_base(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
        }
    }

    /// Default request timeout for a single round trip.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        Duration::from_secs(120)
    }

    /// API documentation landing page.
    #[must_use]
    pub const fn docs_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://docs.anthropic.com/en/api",
            Self::OpenAi => "https://platform.openai.com/docs/api-reference",
        }
    }

    /// Get the status page URL for this provider.
    #[must_use]
    pub const fn status_page_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://status.anthropic.com",
            Self::OpenAi => "https://status.openai.com",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for Provider {
    type Err = RalphError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cli_name(s)
    }
}
