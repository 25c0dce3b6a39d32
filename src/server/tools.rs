//! Tool catalog
//!
//! The server exposes a fixed set of tools; `tools.list` reports them with
//! their input schemas so callers can discover the surface.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A tool exposed by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the args object
    pub input_schema: Value,
}

impl ToolSpec {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// All tools the server answers to
pub fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "collect",
            "Run DPAPI secret collection against a target set and aggregate the loot",
            json!({
                "type": "object",
                "properties": {
                    "targets": {
                        "type": ["string", "array"],
                        "description": "Hosts, CIDR blocks, dash ranges, or @file list references"
                    },
                    "username": { "type": "string" },
                    "password": { "type": "string" },
                    "domain": { "type": "string" },
                    "hashes": { "type": "string", "description": "LM:NT hash pair for pass-the-hash" },
                    "kerberos": { "type": "boolean" },
                    "collectors": { "type": "string", "description": "Comma-separated collector names" },
                    "timeoutSeconds": { "type": "integer", "minimum": 1 },
                    "concurrency": { "type": "integer", "minimum": 1 }
                },
                "required": ["targets"]
            }),
        ),
        ToolSpec::new(
            "cancel",
            "Cancel an in-flight collect invocation; completed work is kept",
            json!({
                "type": "object",
                "properties": {
                    "requestId": {
                        "type": "integer",
                        "description": "The id of the collect request to cancel"
                    }
                },
                "required": ["requestId"]
            }),
        ),
        ToolSpec::new(
            "loot.list",
            "List collected loot, either per target or as a per-target summary",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "Return full records for this target instead of the summary"
                    }
                },
                "required": []
            }),
        ),
        ToolSpec::new(
            "tools.list",
            "List the tools this server exposes",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
        ToolSpec::new(
            "ping",
            "Liveness check",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
    ]
}
