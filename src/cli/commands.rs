//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - serve: run the tool server
//! - collect: run one collection invocation from the command line
//! - targets: preview what a target spec resolves to
//! - loot: inspect the loot store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// harvestr - tool server for orchestrating remote DPAPI secret collection
#[derive(Parser, Debug)]
#[command(name = "harvestr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute; defaults to serve
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tool server
    Serve {
        /// Listen port, overriding the config
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address, overriding the config
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run one collection invocation and print the outcome
    Collect {
        /// Targets: hosts, CIDR blocks, dash ranges, or @file references
        targets: String,

        /// Username for authentication
        #[arg(short, long)]
        username: Option<String>,

        /// Password for authentication
        #[arg(short, long)]
        password: Option<String>,

        /// Authentication domain
        #[arg(short, long)]
        domain: Option<String>,

        /// LM:NT hash pair for pass-the-hash
        #[arg(short = 'H', long)]
        hashes: Option<String>,

        /// Use Kerberos authentication
        #[arg(short, long)]
        kerberos: bool,

        /// Comma-separated collector names
        #[arg(short = 'C', long)]
        collectors: Option<String>,

        /// Per-target timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Worker pool size
        #[arg(long)]
        concurrency: Option<usize>,

        /// Loot output directory, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what a target spec resolves to, without collecting
    Targets {
        /// Hosts, CIDR blocks, dash ranges, or @file references
        spec: String,
    },

    /// Inspect the loot store
    Loot {
        #[command(subcommand)]
        command: LootCommands,
    },
}

/// Loot store subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum LootCommands {
    /// List targets with loot and their record counts
    List,

    /// Show the records collected from one target
    Show {
        /// Target to show
        target: String,
    },
}
