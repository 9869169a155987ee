//! Unified error types for the convirt workspace.
//!
//! The domain layer converts every one of these into the single generic
//! failure signal of the emulated virtualization API; the variants only
//! survive in logs and in the lower layers.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ConvirtError {
    /// Malformed or missing descriptor data, or an invalid configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An external command exited with a nonzero status.
    #[error("command `{command}` failed with status {status:?}: {stderr}")]
    OperationFailed {
        /// Command line that was executed.
        command: String,
        /// Exit code, `None` if the process was killed by a signal.
        status: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// A required executable is not installed.
    #[error("executable not found: {name}")]
    NotFound {
        /// Name of the missing executable.
        name: String,
    },

    /// An operation referenced an identifier that is not registered.
    #[error("{kind} not registered: {id}")]
    Lookup {
        /// Type of the missing entry.
        kind: &'static str,
        /// Identifier of the missing entry.
        id: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ConvirtError {
    /// Shorthand for a [`ConvirtError::Config`] with the given message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Builds an [`ConvirtError::Io`] error bound to `path`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConvirtError>;
