//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the attache binary.

mod commands;
mod handlers;
mod mime;

pub use commands::Cli;
pub use handlers::handle_command;
