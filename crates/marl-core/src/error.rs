//! Allocation error types.
//!
//! A single enum covers every failure a [`MemoryResource`] can report.
//! Contract violations (freeing with a mismatched size or alignment) are
//! `unsafe` preconditions and never appear here.
//!
//! [`MemoryResource`]: crate::MemoryResource

use std::error::Error;
use std::fmt;

/// Errors returned by [`MemoryResource::allocate`](crate::MemoryResource::allocate)
/// and the typed [`PolymorphicAllocator`](crate::PolymorphicAllocator).
///
/// A failed request allocates nothing and leaves the resource's internal
/// bookkeeping untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The resource (or its upstream) cannot satisfy the request.
    OutOfMemory {
        /// Number of bytes requested from the failing resource.
        bytes: usize,
        /// Alignment requested from the failing resource.
        alignment: usize,
    },
    /// The alignment is not a power of two, or rounding the size up to it
    /// overflows `usize`.
    InvalidLayout {
        /// Number of bytes requested.
        bytes: usize,
        /// The offending alignment.
        alignment: usize,
    },
    /// `count * elem_size` overflows `usize` in a typed allocation.
    CapacityOverflow {
        /// Number of elements requested.
        count: usize,
        /// Size of one element in bytes.
        elem_size: usize,
    },
}

impl AllocError {
    /// Shorthand for [`AllocError::OutOfMemory`].
    pub fn out_of_memory(bytes: usize, alignment: usize) -> Self {
        Self::OutOfMemory { bytes, alignment }
    }

    /// Whether this error means the memory source is exhausted, as opposed
    /// to a malformed request.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { bytes, alignment } => {
                write!(
                    f,
                    "out of memory: requested {bytes} bytes with alignment {alignment}"
                )
            }
            Self::InvalidLayout { bytes, alignment } => {
                write!(
                    f,
                    "invalid layout: {bytes} bytes with alignment {alignment}"
                )
            }
            Self::CapacityOverflow { count, elem_size } => {
                write!(
                    f,
                    "capacity overflow: {count} elements of {elem_size} bytes"
                )
            }
        }
    }
}

impl Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_sizes() {
        let err = AllocError::out_of_memory(128, 16);
        assert_eq!(
            err.to_string(),
            "out of memory: requested 128 bytes with alignment 16"
        );
    }

    #[test]
    fn only_out_of_memory_is_exhaustion() {
        assert!(AllocError::out_of_memory(1, 1).is_out_of_memory());
        assert!(!AllocError::InvalidLayout {
            bytes: 1,
            alignment: 3
        }
        .is_out_of_memory());
        assert!(!AllocError::CapacityOverflow {
            count: usize::MAX,
            elem_size: 8
        }
        .is_out_of_memory());
    }
}
