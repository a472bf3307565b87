//! PRD command implementation.

use std::io::Read as _;
use std::path::Path;

use crate::cli::args::{OutputFormat, PrdCommand};
use crate::error::{RalphError, Result};
use crate::render;
use crate::storage::config::Config;
use crate::storage::prd_lock::PrdLock;

/// Execute a PRD subcommand.
///
/// # Errors
///
/// Returns error when the lock cannot be acquired, the file cannot be
/// read, or a write fails.
pub async fn execute(cmd: &PrdCommand, format: OutputFormat, pretty: bool) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let lock = PrdLock::from_config(&config);

    match cmd {
        PrdCommand::Write {
            path,
            content,
            from,
        } => {
            let content = match (content, from) {
                (Some(content), _) => content.clone(),
                (None, Some(source)) => tokio::fs::read_to_string(source).await?,
                (None, None) => read_stdin()?,
            };
            write(&lock, path, content, format, pretty).await
        }
        PrdCommand::Read { path } => {
            let content = lock.read_with_lock(path).await?;
            print!("{content}");
            Ok(())
        }
        PrdCommand::Status { path } => {
            let status = lock.status(path);
            emit(&render::render_status(&status, format, pretty)?, format);
            Ok(())
        }
    }
}

async fn write(
    lock: &PrdLock,
    path: &Path,
    content: String,
    format: OutputFormat,
    pretty: bool,
) -> Result<()> {
    let outcome = lock.write_with_lock(path, content).await;
    if outcome.success || format != OutputFormat::Human {
        emit(&render::render_write(&outcome, format, pretty)?, format);
    }
    match outcome.error {
        None => Ok(()),
        Some(message) => Err(RalphError::Other(anyhow::anyhow!(
            "write to {} failed: {message}",
            path.display()
        ))),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn emit(output: &str, format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{output}");
    } else {
        print!("{output}");
    }
}
