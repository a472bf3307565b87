//! CLI argument parsing and command dispatch.

pub mod args;
pub mod config;
pub mod prd;
pub mod ultrathink;

pub use args::{Cli, Commands, OutputFormat};
