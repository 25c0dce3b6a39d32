//! harvestr - a tool server for orchestrating remote DPAPI secret collection
//!
//! harvestr resolves a target spec into a set of hosts, runs a collection
//! backend against each one under a bounded worker pool, claims whatever
//! secrets come back into a durable loot store, and reports one aggregate
//! outcome per invocation over a newline-delimited JSON protocol.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod id;
pub mod loot;
pub mod orchestrator;
pub mod resolver;
pub mod server;

pub use error::{HarvestrError, Result};
