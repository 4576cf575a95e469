//! Shared error type across vigil crates.
//!
//! Metric write paths never produce these; they only surface from config
//! loading, input parsing, collaborator calls and OS probes.

use thiserror::Error;

/// Stable error codes, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Config could not be parsed or failed validation.
    BadConfig,
    /// Config declared a schema version we do not understand.
    UnsupportedVersion,
    /// Caller-supplied text did not parse (e.g. an unknown job event name).
    InvalidInput,
    /// An external collaborator (job store, cache, storage) failed.
    Collaborator,
    /// A host resource probe failed.
    Sampling,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadConfig => "BAD_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Collaborator => "COLLABORATOR",
            ErrorKind::Sampling => "SAMPLING",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Unified error type used by core and monitor.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("collaborator {source_name} failed: {message}")]
    Collaborator {
        source_name: &'static str,
        message: String,
    },
    #[error("sampling failed: {0}")]
    Sampling(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl VigilError {
    /// Shorthand for collaborator failures.
    pub fn collaborator(source_name: &'static str, message: impl Into<String>) -> Self {
        VigilError::Collaborator {
            source_name,
            message: message.into(),
        }
    }

    /// Map to a stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VigilError::BadConfig(_) => ErrorKind::BadConfig,
            VigilError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            VigilError::InvalidInput(_) => ErrorKind::InvalidInput,
            VigilError::Collaborator { .. } => ErrorKind::Collaborator,
            VigilError::Sampling(_) => ErrorKind::Sampling,
            VigilError::Internal(_) => ErrorKind::Internal,
        }
    }
}
