//! webconf CLI
//!
//! Subcommand definitions and output formatting for the `webconf` binary.

pub mod commands;
pub mod output;
