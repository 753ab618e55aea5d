//! Error types for cosync collections and views.

use alloc::string::String;
use core::fmt;

/// Result type alias for cosync operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for collection and view operations.
///
/// `InvariantViolation` is a fault: the view or source that raised it is out of
/// sync and must not be used to emit further events. The remaining variants are
/// recoverable input errors detected before any mutation takes place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A consistency check failed (source/view desync, missing key, bad Reset).
    InvariantViolation {
        message: String,
    },
    /// An argument was rejected before mutation.
    InvalidArgument {
        name: &'static str,
        message: String,
    },
    /// Index access outside the collection bounds.
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// A reference count would drop below zero.
    NegativeReferenceCount {
        count: i64,
    },
    /// A positional insert collided with an existing key.
    DuplicateKey,
    /// A collection was mutated from inside its own change notification.
    Reentrancy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvariantViolation { message } => {
                write!(f, "Invariant violation: {}", message)
            }
            Error::InvalidArgument { name, message } => {
                write!(f, "Invalid argument '{}': {}", name, message)
            }
            Error::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            Error::NegativeReferenceCount { count } => {
                write!(f, "Reference count would become negative ({})", count)
            }
            Error::DuplicateKey => write!(f, "Key already added"),
            Error::Reentrancy => {
                write!(f, "Cannot change the collection during its own change notification")
            }
        }
    }
}

impl Error {
    /// Creates an invariant violation (fault) error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates a negative reference count error.
    pub fn negative_reference_count(count: i64) -> Self {
        Error::NegativeReferenceCount { count }
    }

    /// Returns true if this error is an unrecoverable consistency fault.
    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::InvariantViolation { .. })
    }

    /// Checks `index < len`, returning an `IndexOutOfRange` error otherwise.
    #[inline]
    pub fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(Error::index_out_of_range(index, len))
        }
    }

    /// Checks `index <= len` (an insertion point), returning an error otherwise.
    #[inline]
    pub fn check_insert_index(index: usize, len: usize) -> Result<()> {
        if index <= len {
            Ok(())
        } else {
            Err(Error::index_out_of_range(index, len))
        }
    }
}
