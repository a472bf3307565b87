//! API key lookup.
//!
//! Keys come from `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` first and then from
//! the OS keyring (service `ralph`, user = provider CLI name). Setting
//! `RALPH_NO_KEYRING` skips the keyring entirely.

use std::fmt;

use crate::core::provider::Provider;
use crate::error::{RalphError, Result};
use crate::util::env::{env_non_empty, is_env_truthy};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "ralph";
/// Environment variable that disables keyring lookups.
pub const ENV_NO_KEYRING: &str = "RALPH_NO_KEYRING";

/// Provider API keys available to this process.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    anthropic: Option<String>,
    openai: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("anthropic", &self.anthropic.as_ref().map(|_| "<redacted>"))
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// No keys at all.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Builder: set the key for `provider`. Blank keys are ignored.
    #[must_use]
    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        let key = key.into();
        let key = (!key.trim().is_empty()).then(|| key.trim().to_string());
        match provider {
            Provider::Anthropic => self.anthropic = key,
            Provider::OpenAi => self.openai = key,
        }
        self
    }

    /// Keys from environment variables only.
    #[must_use]
    pub fn from_env() -> Self {
        Provider::ALL.iter().fold(Self::none(), |creds, provider| {
            match env_non_empty(provider.api_key_env_var()) {
                Some(key) => creds.with_key(*provider, key),
                None => creds,
            }
        })
    }

    /// Keys from the environment, falling back to the OS keyring unless
    /// `RALPH_NO_KEYRING` is truthy.
    #[must_use]
    pub fn resolve() -> Self {
        let mut creds = Self::from_env();
        if is_env_truthy(ENV_NO_KEYRING) {
            return creds;
        }
        for provider in Provider::ALL {
            if creds.has(*provider) {
                continue;
            }
            if let Some(key) = keyring_lookup(*provider) {
                tracing::debug!(provider = %provider, "using API key from keyring");
                creds = creds.with_key(*provider, key);
            }
        }
        creds
    }

    #[must_use]
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Anthropic => self.anthropic.as_deref(),
            Provider::OpenAi => self.openai.as_deref(),
        }
    }

    #[must_use]
    pub fn has(&self, provider: Provider) -> bool {
        self.api_key(provider).is_some()
    }

    /// The key for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`RalphError::CredentialsMissing`] when no key is configured.
    pub fn require(&self, provider: Provider) -> Result<&str> {
        self.api_key(provider)
            .ok_or(RalphError::CredentialsMissing {
                provider,
                env_var: provider.api_key_env_var(),
            })
    }
}

fn keyring_lookup(provider: Provider) -> Option<String> {
    let entry = match keyring::Entry::new(KEYRING_SERVICE, provider.cli_name()) {
        Ok(entry) => entry,
        Err(e) => {
            tracing::debug!(provider = %provider, error = %e, "keyring unavailable");
            return None;
        }
    };
    match entry.get_password() {
        Ok(key) if !key.trim().is_empty() => Some(key),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(provider = %provider, error = %e, "no keyring entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_key_sets_and_trims() {
        let creds = Credentials::none().with_key(Provider::OpenAi, "  sk-test  ");
        assert_eq!(creds.api_key(Provider::OpenAi), Some("sk-test"));
        assert!(!creds.has(Provider::Anthropic));
    }

    #[test]
    fn blank_keys_are_ignored() {
        let creds = Credentials::none().with_key(Provider::Anthropic, "   ");
        assert!(!creds.has(Provider::Anthropic));
    }

    #[test]
    fn require_reports_env_var() {
        let err = Credentials::none().require(Provider::Anthropic).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn debug_redacts_keys() {
        let creds = Credentials::none().with_key(Provider::Anthropic, "sk-ant-secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
