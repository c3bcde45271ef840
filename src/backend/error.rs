//! Error types for the external store collaborators
//!
//! Every collaborator (document store, object probe, checksum database) reports
//! failures through [`BackendError`]. The variants map onto the taxonomy the
//! reconciliation core reasons about: absence, transport faults, query faults
//! and connectivity loss.

use std::io;
use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Unified error type for backend operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No document, object or row matched the lookup
    #[error("Not found in {backend}: {what}")]
    NotFound { backend: String, what: String },

    /// Network or protocol failure talking to the remote store
    #[error("Transport error ({backend}): {message}")]
    Transport { backend: String, message: String },

    /// The store answered but the query itself failed
    #[error("Query failed ({backend}): {message}")]
    Query { backend: String, message: String },

    /// The connection is down or could not be established
    #[error("Connection to {backend} failed: {message}")]
    Connection { backend: String, message: String },

    /// A returned document did not have the expected shape
    #[error("Could not decode {what}: {message}")]
    Decode { what: String, message: String },

    /// Invalid configuration for backend
    #[error("Invalid configuration for {backend}: {message}")]
    InvalidConfig { backend: String, message: String },

    /// Backend not compiled into this build
    #[error("Backend '{backend}' is not available: {reason}")]
    Unsupported { backend: String, reason: String },
}

impl BackendError {
    pub fn not_found(backend: impl Into<String>, what: impl Into<String>) -> Self {
        BackendError::NotFound {
            backend: backend.into(),
            what: what.into(),
        }
    }

    pub fn transport(backend: impl Into<String>, message: impl ToString) -> Self {
        BackendError::Transport {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn query(backend: impl Into<String>, message: impl ToString) -> Self {
        BackendError::Query {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn connection(backend: impl Into<String>, message: impl ToString) -> Self {
        BackendError::Connection {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Check if this error indicates the resource was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            BackendError::not_found("io", err.to_string())
        } else {
            BackendError::transport("io", err)
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode {
            what: "document".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(BackendError::not_found("s3", "bucket/key").is_not_found());
        assert!(!BackendError::transport("s3", "reset").is_not_found());
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: BackendError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());

        let err: BackendError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, BackendError::Transport { .. }));
    }

    #[test]
    fn test_display_includes_backend() {
        let err = BackendError::query("postgres", "no rows in result set");
        assert_eq!(err.to_string(), "Query failed (postgres): no rows in result set");
    }
}
