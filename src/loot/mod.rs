//! Loot aggregation
//!
//! Turns raw backend output into [`LootRecord`]s and commits them to the
//! durable store. Claiming is idempotent per (target, digest), so replaying
//! a job result never produces duplicate records.
//!
//! [`LootRecord`]: crate::domain::LootRecord

pub mod parse;
pub mod store;

pub use parse::parse_output;
pub use store::{ClaimOutcome, LootStore};
