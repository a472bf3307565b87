//! Ultrathink command implementation.

use std::sync::Arc;

use crate::cli::args::{OutputFormat, UltrathinkArgs};
use crate::core::credentials::Credentials;
use crate::core::rate_limit::RateLimiter;
use crate::error::Result;
use crate::render;
use crate::storage::config::{Config, ResolvedUltrathink};
use crate::ultrathink::{StrategyOptions, generate_proposal};

/// Execute the ultrathink command.
///
/// A missing credential or failed round trip still prints a (degraded)
/// proposal; only configuration problems are errors.
///
/// # Errors
///
/// Returns error for invalid arguments or configuration.
pub async fn execute(args: &UltrathinkArgs, format: OutputFormat, pretty: bool) -> Result<()> {
    args.validate()?;

    let config = Config::load()?;
    config.validate()?;
    let resolved = ResolvedUltrathink::resolve(&config, &args.overrides())?;

    tracing::debug!(
        model = %resolved.model,
        model_source = %resolved.sources.model,
        timeout_secs = resolved.timeout.as_secs(),
        budget = resolved.thinking_budget,
        effort = %resolved.effort,
        "resolved ultrathink settings"
    );

    let limiter = Arc::new(RateLimiter::from_config(&config));
    let options = StrategyOptions::from_config(&config)?.with_limiter(limiter);
    let credentials = Credentials::resolve();
    let request = args.request(&resolved);

    let result = generate_proposal(&request, &credentials, &options).await;
    print!("{}", render::render_reasoning(&result, format, pretty)?);
    if matches!(format, OutputFormat::Json) {
        println!();
    }
    Ok(())
}
