/*!
 * Error types for reconciliation runs
 */

use std::fmt;
use std::io;
use std::time::Duration;

use crate::backend::BackendError;

pub type Result<T> = std::result::Result<T, ReconError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug)]
pub enum ReconError {
    /// Configuration error
    Config(String),

    /// I/O error
    Io(io::Error),

    /// A store could not be opened or answered unexpectedly outside a lookup
    Backend(BackendError),

    /// The checksum database stayed unreachable past its reconnect budget.
    /// Continuing would report every remaining file as absent.
    ChecksumStoreUnreachable { waited: Duration, processed: usize },

    /// Generic error with message
    Other(String),
}

impl ReconError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconError::Config(_)
            | ReconError::Backend(_)
            | ReconError::ChecksumStoreUnreachable { .. } => EXIT_FATAL,
            ReconError::Io(_) | ReconError::Other(_) => EXIT_PARTIAL,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReconError::Config(_) => ErrorCategory::Configuration,
            ReconError::Io(_) => ErrorCategory::IoError,
            ReconError::Backend(_) => ErrorCategory::Backend,
            ReconError::ChecksumStoreUnreachable { .. } => ErrorCategory::Connectivity,
            ReconError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    IoError,
    Backend,
    Connectivity,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Backend => write!(f, "backend"),
            ErrorCategory::Connectivity => write!(f, "connectivity"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            ReconError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
            ReconError::Backend(err) => {
                write!(f, "{}", err)
            }
            ReconError::ChecksumStoreUnreachable { waited, processed } => {
                write!(
                    f,
                    "Could not reconnect to the checksum database within {}s, \
                     giving up after {} file(s)",
                    waited.as_secs(),
                    processed
                )
            }
            ReconError::Other(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconError::Io(err) => Some(err),
            ReconError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReconError {
    fn from(err: io::Error) -> Self {
        ReconError::Io(err)
    }
}

impl From<BackendError> for ReconError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InvalidConfig { backend, message } => {
                ReconError::Config(format!("{}: {}", backend, message))
            }
            other => ReconError::Backend(other),
        }
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        ReconError::Other(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ReconError::Config("x".to_string()).exit_code(), EXIT_FATAL);
        assert_eq!(
            ReconError::ChecksumStoreUnreachable {
                waited: Duration::from_secs(1),
                processed: 0,
            }
            .exit_code(),
            EXIT_FATAL
        );
    }

    #[test]
    fn test_unreachable_display() {
        let err = ReconError::ChecksumStoreUnreachable {
            waited: Duration::from_secs(305),
            processed: 12,
        };
        assert_eq!(
            err.to_string(),
            "Could not reconnect to the checksum database within 305s, giving up after 12 file(s)"
        );
        assert_eq!(err.category(), ErrorCategory::Connectivity);
    }

    #[test]
    fn test_invalid_backend_config_becomes_config_error() {
        let err: ReconError = BackendError::InvalidConfig {
            backend: "s3".to_string(),
            message: "bucket missing".to_string(),
        }
        .into();
        assert!(matches!(err, ReconError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: s3: bucket missing");
    }
}
