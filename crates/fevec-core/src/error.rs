//! Error type shared by every vector backend.
//!
//! One enum covers the five failure kinds a vector operation can report.
//! Failures are returned to the immediate caller; nothing is retried.

use std::error::Error;
use std::fmt;

use crate::types::MemType;

/// Errors returned by vector, backend, and device runtime operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VectorError {
    /// An argument is out of range or incompatible with the request
    /// (oversized length, unsupported memory space, cross-space copy).
    InvalidArgument {
        /// Human-readable description of the bad argument.
        reason: String,
    },
    /// The operation needs data that was never provided.
    InvalidState {
        /// Description of what is missing.
        reason: String,
    },
    /// Host or device memory is exhausted.
    AllocationFailure {
        /// Memory space the allocation was made in.
        space: MemType,
        /// Number of bytes requested.
        requested: usize,
    },
    /// The device runtime reported an error during a copy or kernel call.
    DeviceRuntimeFailure {
        /// Description reported by the runtime.
        reason: String,
    },
    /// Memory is still borrowed or checked out and cannot be released or
    /// reassigned.
    OwnershipViolation {
        /// Description of the conflicting access.
        reason: String,
    },
}

impl VectorError {
    /// Shorthand for [`VectorError::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VectorError::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VectorError::DeviceRuntimeFailure`].
    pub fn device(reason: impl Into<String>) -> Self {
        Self::DeviceRuntimeFailure {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VectorError::OwnershipViolation`].
    pub fn ownership(reason: impl Into<String>) -> Self {
        Self::OwnershipViolation {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::InvalidState { reason } => write!(f, "invalid state: {reason}"),
            Self::AllocationFailure { space, requested } => {
                write!(f, "{space} allocation of {requested} bytes failed")
            }
            Self::DeviceRuntimeFailure { reason } => {
                write!(f, "device runtime failure: {reason}")
            }
            Self::OwnershipViolation { reason } => write!(f, "ownership violation: {reason}"),
        }
    }
}

impl Error for VectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = VectorError::AllocationFailure {
            space: MemType::Device,
            requested: 4096,
        };
        assert_eq!(err.to_string(), "device allocation of 4096 bytes failed");

        let err = VectorError::invalid_state("no data");
        assert_eq!(err.to_string(), "invalid state: no data");
    }

    #[test]
    fn errors_are_std_errors() {
        let err: Box<dyn Error> = Box::new(VectorError::device("launch failed"));
        assert!(err.to_string().contains("launch failed"));
    }
}
