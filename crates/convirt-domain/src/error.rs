//! Error signal of the emulated virtualization API.
//!
//! Callers of a domain only ever see [`VirError`]. Whatever went wrong below
//! is logged where the conversion happens and then dropped.

use std::fmt;

use thiserror::Error;

/// Category of a [`VirError`], mirroring the foreign API's error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirErrorCode {
    /// A supported operation failed.
    OperationFailed,
    /// The operation is not part of the supported surface.
    NoSupport,
}

impl fmt::Display for VirErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperationFailed => write!(f, "operation failed"),
            Self::NoSupport => write!(f, "this function is not supported by the connection driver"),
        }
    }
}

/// Generic failure returned at the domain boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{code}: {operation}")]
pub struct VirError {
    code: VirErrorCode,
    operation: &'static str,
}

impl VirError {
    /// Failure of a supported operation.
    #[must_use]
    pub const fn operation_failed(operation: &'static str) -> Self {
        Self {
            code: VirErrorCode::OperationFailed,
            operation,
        }
    }

    /// Rejection of an operation outside the supported surface.
    #[must_use]
    pub const fn no_support(operation: &'static str) -> Self {
        Self {
            code: VirErrorCode::NoSupport,
            operation,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn code(&self) -> VirErrorCode {
        self.code
    }

    /// Returns the name of the operation that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}
