//! CLI module for the fitplan sync tool.
//!
//! This module provides the command-line interface for checking out,
//! editing and pushing training plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, EditCommands, OutputFormat, StateCommands};
pub use output::OutputFormatter;
