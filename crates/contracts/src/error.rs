//! Layered error definitions
//!
//! Categorized by source: transient upstream / permanent request / queue / config

use thiserror::Error;

use crate::{Destination, RecordId};

/// Unified error type
#[derive(Debug, Error)]
pub enum RelayError {
    // ===== Transient Upstream Errors =====
    /// Attempt exceeded its per-attempt timeout
    #[error("{destination} timed out after {timeout_ms}ms")]
    Timeout {
        destination: Destination,
        timeout_ms: u64,
    },

    /// Connection-level upstream failure
    #[error("{destination} connection error: {message}")]
    Connection {
        destination: Destination,
        message: String,
    },

    /// Upstream answered with a non-success status
    #[error("{destination} returned status {status}")]
    UpstreamStatus {
        destination: Destination,
        status: u16,
    },

    // ===== Permanent Request Errors =====
    /// Device has no farm/zone assignment; inserts for it can never succeed
    #[error("device '{machine_id}' is not assigned to any farm/zone")]
    UnassignedDevice { machine_id: String },

    /// Semantically invalid request; never retried, never queued
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    // ===== Read-Path Errors =====
    /// Both the remote API and the storage fallback were unreachable
    #[error("{destination} unavailable and no fallback answered")]
    Unavailable { destination: Destination },

    // ===== Queue Errors =====
    /// Offline queue storage failure
    #[error("offline queue error: {message}")]
    Queue {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Record id not present in the offline queue
    #[error("record {record_id} not found in offline queue")]
    RecordNotFound { record_id: RecordId },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Create a connection error for a destination
    pub fn connection(destination: Destination, message: impl Into<String>) -> Self {
        Self::Connection {
            destination,
            message: message.into(),
        }
    }

    /// Create an offline queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the retry loop may try this error again
    ///
    /// Transient errors are retried up to the budget and then queued;
    /// everything else aborts delivery immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Timeout { .. }
                | RelayError::Connection { .. }
                | RelayError::UpstreamStatus { .. }
        )
    }
}

/// Convenience alias used across the relay crates
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RelayError::Timeout {
            destination: Destination::Storage,
            timeout_ms: 10_000,
        }
        .is_transient());
        assert!(RelayError::connection(Destination::RemoteApi, "refused").is_transient());

        assert!(!RelayError::UnassignedDevice {
            machine_id: "m1".into(),
        }
        .is_transient());
        assert!(!RelayError::RecordNotFound { record_id: 7 }.is_transient());
    }
}
