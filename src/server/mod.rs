//! Tool server
//!
//! Network-reachable facade over the resolver, orchestrator, and loot store.
//! Clients speak newline-delimited JSON over TCP; each request names a tool
//! and passes an args object, and gets back a result or a coded error.

pub mod handler;
pub mod listener;
pub mod messages;
pub mod tools;

pub use handler::ToolHandler;
pub use listener::ToolServer;
pub use messages::{ErrorCode, ToolError, ToolRequest, ToolResponse};
pub use tools::{ToolSpec, catalog};
