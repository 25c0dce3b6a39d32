//! Job orchestration
//!
//! Bounded-concurrency execution of an invocation's jobs, with cancellation,
//! ordered results, and reduction into one aggregate outcome.

pub mod engine;
pub mod phase;

pub use engine::Orchestrator;
pub use phase::Phase;
