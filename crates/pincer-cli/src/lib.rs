//! The `pincer` command-line tool.
//!
//! Thin, non-interactive wrapper over [`pincer_core`]: argument parsing
//! lives in [`cli`], command execution in [`commands`]. Destructive
//! operations take a `--force` flag instead of prompting.

pub mod cli;
pub mod commands;
pub mod error;

pub use error::CliError;
