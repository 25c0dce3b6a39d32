//! CLI module for harvestr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for serving, one-shot
//! collection, target resolution preview, and loot inspection.

pub mod commands;

pub use commands::{Cli, Commands, LootCommands};
