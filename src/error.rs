//! Error types for harvestr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in harvestr
#[derive(Debug, Error)]
pub enum HarvestrError {
    /// Targets argument could not be parsed into a target set
    #[error("Invalid target spec: {0}")]
    InvalidTargetSpec(String),

    /// Targets argument resolved to zero targets
    #[error("Empty target set")]
    EmptyTargetSet,

    /// Collection backend missing or not runnable; fails the whole invocation
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Durable loot store write failure
    #[error("Persist error: {0}")]
    Persist(String),

    /// Malformed or unanswerable protocol traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid orchestrator or job state transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for harvestr operations
pub type Result<T> = std::result::Result<T, HarvestrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_spec_error() {
        let err = HarvestrError::InvalidTargetSpec("bad token '10.0.0'".to_string());
        assert_eq!(err.to_string(), "Invalid target spec: bad token '10.0.0'");
    }

    #[test]
    fn test_empty_target_set_error() {
        let err = HarvestrError::EmptyTargetSet;
        assert_eq!(err.to_string(), "Empty target set");
    }

    #[test]
    fn test_backend_unavailable_error() {
        let err = HarvestrError::BackendUnavailable("donpapi not found on PATH".to_string());
        assert_eq!(
            err.to_string(),
            "Backend unavailable: donpapi not found on PATH"
        );
    }

    #[test]
    fn test_persist_error() {
        let err = HarvestrError::Persist("rename failed".to_string());
        assert_eq!(err.to_string(), "Persist error: rename failed");
    }

    #[test]
    fn test_protocol_error() {
        let err = HarvestrError::Protocol("missing tool name".to_string());
        assert_eq!(err.to_string(), "Protocol error: missing tool name");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = HarvestrError::InvalidState("cannot dispatch after draining".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot dispatch after draining"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HarvestrError = io_err.into();
        assert!(matches!(err, HarvestrError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: HarvestrError = json_err.into();
        assert!(matches!(err, HarvestrError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(HarvestrError::EmptyTargetSet)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
