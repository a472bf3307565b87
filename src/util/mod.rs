//! Utility functions.

pub mod env;
pub mod format;
pub mod time;

pub use format::{collapse_whitespace, format_tokens, truncate_chars};
pub use time::{format_duration, format_timestamp};
