//! Structured error types for consolecap
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these ever reach the host page: installation and channel failures
//! are logged and absorbed where they occur.

use super::types::ContextId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("Host rejected defining console.{0} (slot not configurable)")]
    DefineRejected(String),

    #[error("Host rejected assigning console.{0} (slot not writable)")]
    AssignRejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Inspection channel already attached to {0}")]
    AlreadyAttached(ContextId),

    #[error("Inspection channel not attached to {0}")]
    NotAttached(ContextId),

    #[error("Execution context {0} has closed")]
    ContextClosed(ContextId),

    #[error("Malformed protocol message: {0}")]
    MalformedMessage(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Report rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_error_display() {
        let err = InstallError::DefineRejected("warn".to_string());
        assert_eq!(err.to_string(), "Host rejected defining console.warn (slot not configurable)");
    }

    #[test]
    fn test_channel_error_mentions_context() {
        let err = ChannelError::ContextClosed(ContextId(42));
        assert!(err.to_string().contains("CTX:42"));
    }

    #[test]
    fn test_submit_error_wraps_export() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "boom");
        let err = SubmitError::from(ExportError::from(io));
        assert!(err.to_string().contains("boom"));
    }
}
