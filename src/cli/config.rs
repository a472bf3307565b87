//! Config command implementation.

use serde::Serialize;

use crate::cli::args::{ConfigCommand, OutputFormat};
use crate::error::{RalphError, Result};
use crate::render::robot::{RobotOutput, render_json};
use crate::storage::config::Config;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigPath {
    path: String,
    exists: bool,
}

/// Execute a config subcommand.
///
/// # Errors
///
/// Returns error if the config file exists but cannot be parsed.
pub fn execute(cmd: &ConfigCommand, format: OutputFormat, pretty: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Path => {
            let path = Config::config_path();
            match format {
                OutputFormat::Json => {
                    let data = ConfigPath {
                        path: path.display().to_string(),
                        exists: path.exists(),
                    };
                    println!("{}", render_json(&RobotOutput::new("config path", data), pretty)?);
                }
                OutputFormat::Human | OutputFormat::Md => println!("{}", path.display()),
            }
        }
        ConfigCommand::Show => {
            let config = Config::load()?;
            match format {
                OutputFormat::Json => {
                    println!("{}", render_json(&RobotOutput::new("config show", &config), pretty)?);
                }
                OutputFormat::Human => print!("{}", to_toml(&config)?),
                OutputFormat::Md => print!("```toml\n{}```\n", to_toml(&config)?),
            }
        }
    }
    Ok(())
}

fn to_toml(config: &Config) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| RalphError::Config(format!("failed to serialize config: {e}")))
}
