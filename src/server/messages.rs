//! Wire messages for the tool server
//!
//! Uses JSON Lines (newline-delimited JSON) over a TCP stream. Field names
//! follow the familiar id/tool/args/result/error convention but this is not
//! a JSON-RPC 2.0 implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarvestrError;

/// Request sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Client-chosen ID for correlating the response (and for cancel)
    pub id: u64,
    /// Tool name, e.g. "collect" or "loot.list"
    pub tool: String,
    /// Tool arguments as a JSON object
    #[serde(default)]
    pub args: Value,
}

impl ToolRequest {
    pub fn new(id: u64, tool: impl Into<String>, args: Value) -> Self {
        Self {
            id,
            tool: tool.into(),
            args,
        }
    }

    pub fn no_args(id: u64, tool: impl Into<String>) -> Self {
        Self::new(id, tool, Value::Object(Default::default()))
    }
}

/// Response sent back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Request ID this response corresponds to
    pub id: u64,
    /// Result value on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error details on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: ToolError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Error details in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PARSE_ERROR, message)
    }

    /// Invalid request error (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST, message)
    }

    /// Unknown tool error (-32601)
    pub fn unknown_tool(tool: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UNKNOWN_TOOL,
            format!("Unknown tool: {}", tool.into()),
        )
    }

    /// Invalid params error (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }

    /// No in-flight invocation with that request id (1005)
    pub fn unknown_request(id: u64) -> Self {
        Self::new(
            ErrorCode::UNKNOWN_REQUEST,
            format!("No in-flight invocation for request id {}", id),
        )
    }

    /// Map a domain error onto its wire code
    pub fn from_domain(err: &HarvestrError) -> Self {
        let code = match err {
            HarvestrError::InvalidTargetSpec(_) => ErrorCode::INVALID_TARGET_SPEC,
            HarvestrError::EmptyTargetSet => ErrorCode::EMPTY_TARGET_SET,
            HarvestrError::BackendUnavailable(_) => ErrorCode::BACKEND_UNAVAILABLE,
            HarvestrError::Persist(_) => ErrorCode::PERSIST_FAILED,
            HarvestrError::Protocol(_) => ErrorCode::INVALID_PARAMS,
            _ => ErrorCode::INTERNAL_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

/// Wire error codes
pub struct ErrorCode;

impl ErrorCode {
    /// Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Tool name not in the catalog
    pub const UNKNOWN_TOOL: i32 = -32601;
    /// Malformed or ill-typed arguments
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal server error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Target spec did not resolve
    pub const INVALID_TARGET_SPEC: i32 = 1001;
    /// Target spec resolved to nothing
    pub const EMPTY_TARGET_SET: i32 = 1002;
    /// Collection backend missing or unlaunchable
    pub const BACKEND_UNAVAILABLE: i32 = 1003;
    /// Loot could not be persisted
    pub const PERSIST_FAILED: i32 = 1004;
    /// Cancel referenced no in-flight invocation
    pub const UNKNOWN_REQUEST: i32 = 1005;
}
