//! Error types for memory backend operations.

use crate::numa::NumaError;

/// Errors that can occur while acquiring or slicing backend storage.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The platform allocator returned no memory
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// Alignment argument was zero or not a power of two
    #[error("invalid alignment {0}: must be a nonzero power of two")]
    InvalidAlignment(usize),

    /// A fixed region cannot hold the requested slot sequence.
    ///
    /// The pool never grows; requesting fewer slots is the caller's job.
    #[error("region exhausted: need {needed} bytes, region holds {available}")]
    PoolExhausted {
        /// Bytes required for the requested slots
        needed: usize,
        /// Bytes the region actually holds
        available: usize,
    },

    /// The requested strategy needs a platform capability that is absent
    /// and no fallback is permitted
    #[error("required capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// NUMA placement errors
    #[error("NUMA error: {0}")]
    Numa(#[from] NumaError),
}
