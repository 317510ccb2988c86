//! Allocation failure, the only runtime error this crate reports.

use std::collections::TryReserveError;
use thiserror::Error;

/// Error returned by every operation that may allocate.
///
/// The receiver of a failed operation is left in its last valid state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The requested element count (or its size in bytes) is not representable.
    #[error("capacity overflow: requested {requested} elements, at most {max} supported")]
    CapacityOverflow {
        /// Number of elements requested
        requested: usize,
        /// Largest element count this container can hold
        max: usize,
    },
    /// The allocator refused to provide the memory.
    #[error("allocation of {requested} elements failed")]
    Exhausted {
        /// Number of elements requested
        requested: usize,
        /// Error reported by the standard collection
        #[source]
        source: TryReserveError,
    },
}

impl AllocError {
    pub(crate) fn exhausted(requested: usize, source: TryReserveError) -> Self {
        AllocError::Exhausted { requested, source }
    }
}
