//! CLI module - command-line interface
//!
//! Contains roster loading and the subcommand implementations.

pub mod commands;

pub use commands::{AgentEntry, Roster};
