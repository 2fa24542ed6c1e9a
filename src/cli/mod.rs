//! CLI module for the Halldyll converge tool.
//!
//! This module provides the command-line interface for validating,
//! planning and applying application manifests.

mod commands;
mod output;

pub use commands::{Cli, Commands, KindFilter, OutputFormat};
pub use output::OutputFormatter;
