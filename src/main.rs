//! ralph - resilience and coordination core
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use ralph::cli::{Cli, Commands};
use ralph::core::logging;
use ralph::storage::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A broken config file is reported by the command that needs it.
    let config_level = Config::load().ok().and_then(|config| config.general.log_level);
    let log_level = logging::resolve_log_level(cli.log_level.as_deref(), config_level.as_deref());
    let log_format = if cli.json_output {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    let format = cli.effective_format();
    let pretty = cli.pretty;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error_code = e.error_code(), "{e}");
            eprintln!("{}", ralph::render::error::render_error(&e, format, pretty));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> ralph::Result<()> {
    let format = cli.effective_format();
    let pretty = cli.pretty;

    match cli.command {
        None => {
            print_quickstart();
            Ok(())
        }
        Some(Commands::Ultrathink(args)) => {
            ralph::cli::ultrathink::execute(&args, format, pretty).await
        }
        Some(Commands::Prd(cmd)) => ralph::cli::prd::execute(&cmd, format, pretty).await,
        Some(Commands::Config(cmd)) => ralph::cli::config::execute(&cmd, format, pretty),
    }
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r#"ralph - resilience and coordination core

USAGE:
    ralph [OPTIONS] <COMMAND>

COMMANDS:
    ultrathink      Generate a deeply-reasoned tie-breaking proposal
    prd             Read, write or inspect the shared PRD under its lock
    config          Show configuration

QUICK START:
    ralph ultrathink --title "Add caching" --concern "stale reads"
    ralph prd write prd.md --from draft.md
    ralph prd status prd.md
    ralph config path

ROBOT MODE (for AI agents):
    ralph ultrathink --title "..." --json
    ralph prd status prd.md --format md

For more help: ralph --help

Version: {}"#,
        env!("CARGO_PKG_VERSION")
    );
}
