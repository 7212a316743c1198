#![allow(missing_docs)]
use crate::types::FuzzingResult;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Custom Result type used in this crate
pub(crate) type FuzzOutcome<T> = Result<T, FuzzError>;

#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("Could not connect to {err_msg}")]
    ConnectionFailed { err_msg: String },
    #[error("Run into a timeout {elapsed}.")]
    Timeout { elapsed: Elapsed },
    #[error("Could not write to the transport: {err_msg}")]
    TransportWrite { err_msg: String },
    #[error("Could not read from the transport: {err_msg}")]
    TransportRead { err_msg: String },
    #[error("Connection was closed by the target")]
    ConnectionClosed,
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Session aborted after {} results: {reason}", partial.len())]
    SessionAborted {
        reason: String,
        partial: Vec<FuzzingResult>,
    },
    #[error("Invalid configuration: {err_msg}")]
    InvalidConfig { err_msg: String },
    #[error("{err}")]
    IoError { err: std::io::Error },
    #[error("{err}")]
    Serde { err: serde_json::Error },
}

impl FuzzError {
    /// Short stable name of the failure, stored as `error_type` in the result details.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            FuzzError::ConnectionFailed { .. } => "connection_failed",
            FuzzError::Timeout { .. } => "timeout",
            FuzzError::TransportWrite { .. } => "transport_write",
            FuzzError::TransportRead { .. } => "transport_read",
            FuzzError::ConnectionClosed => "connection_closed",
            FuzzError::NotConnected => "not_connected",
            FuzzError::SessionAborted { .. } => "session_aborted",
            FuzzError::InvalidConfig { .. } => "invalid_config",
            FuzzError::IoError { .. } => "io",
            FuzzError::Serde { .. } => "serde",
        }
    }

    /// Consumes the error and returns the results completed before a session was aborted.
    #[must_use]
    pub fn into_partial_results(self) -> Vec<FuzzingResult> {
        match self {
            FuzzError::SessionAborted { partial, .. } => partial,
            _ => vec![],
        }
    }
}

impl From<std::io::Error> for FuzzError {
    fn from(err: std::io::Error) -> Self {
        FuzzError::IoError { err }
    }
}

impl From<serde_json::Error> for FuzzError {
    fn from(err: serde_json::Error) -> Self {
        FuzzError::Serde { err }
    }
}

impl From<Elapsed> for FuzzError {
    fn from(elapsed: Elapsed) -> Self {
        FuzzError::Timeout { elapsed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_names() {
        assert_eq!(FuzzError::ConnectionClosed.error_type(), "connection_closed");
        let err: FuzzError = std::io::Error::other("boom").into();
        assert_eq!(err.error_type(), "io");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_partial_results_only_for_aborted_sessions() {
        let err = FuzzError::SessionAborted {
            reason: "cancelled".into(),
            partial: vec![],
        };
        assert_eq!(err.to_string(), "Session aborted after 0 results: cancelled");
        assert!(err.into_partial_results().is_empty());
        assert!(FuzzError::NotConnected.into_partial_results().is_empty());
    }
}
