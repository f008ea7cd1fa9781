//! Unified error type for the Hatch workspace.
//!
//! Every library crate returns [`Result`]; the binary converts these into
//! `anyhow` errors at the command boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HatchError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A digest validation failed.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected digest.
        expected: String,
        /// Actual computed digest.
        actual: String,
    },

    /// A permission or privilege error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The registry answered with a non-200 status.
    #[error("registry returned {status} for {url}: {body}")]
    Registry {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The HTTP transport failed before a response was received.
    #[error("request to {url} failed: {message}")]
    Http {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// A gzip or tar stream was malformed or truncated.
    #[error("archive error: {message}")]
    Archive {
        /// Description of the failure.
        message: String,
    },

    /// A sandbox operation was attempted from the wrong lifecycle state.
    #[error("invalid state transition from {from} to {to}")]
    InvalidState {
        /// State the sandbox was in.
        from: crate::types::LifecycleState,
        /// State the operation would have entered.
        to: crate::types::LifecycleState,
    },
}

impl HatchError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HatchError>;
