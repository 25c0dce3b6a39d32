//! Job execution against the extraction backend
//!
//! The backend is a capability interface so it can be swapped or mocked
//! without touching the orchestrator:
//! - CollectionBackend: the capability trait (`preflight` + `collect`)
//! - ProcessBackend: spawns the configured executable per target
//! - MockBackend: scripted test double
//! - JobExecutor: wraps a backend with deadline enforcement and state mapping

pub mod backend;
pub mod mock;
pub mod process;
pub mod runner;

pub use backend::{BackendRun, CollectionBackend};
pub use mock::{MockBackend, MockBehavior};
pub use process::ProcessBackend;
pub use runner::JobExecutor;
