//! Domain types for harvestr
//!
//! This module contains all core domain types:
//! - Target: a normalized extraction destination
//! - Job: one unit of work binding a Target to an invocation, with its state machine
//! - CollectOptions / ToolInvocation: the inbound request side
//! - LootRecord: a single extracted artifact
//! - TargetOutcome / AggregateResult: the reduced outbound result

pub mod invocation;
pub mod job;
pub mod loot;
pub mod outcome;
pub mod target;

pub use invocation::{CollectOptions, ToolInvocation};
pub use job::{Job, JobResult, JobState};
pub use loot::{ArtifactKind, LootRecord};
pub use outcome::{AggregateResult, OverallStatus, TargetOutcome};
pub use target::Target;
