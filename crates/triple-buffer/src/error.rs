//! Buffer Error Types

use thiserror::Error;

/// Errors raised by buffer managers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Bad creation parameter, malformed region or mismatched sample
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Slot storage could not be reserved at creation time
    #[error("Failed to allocate buffer slot for capacity {capacity}")]
    AllocationFailure { capacity: usize },

    /// Incoming sample is larger than the slots
    #[error("Sample length {len} exceeds buffer capacity {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },
}

impl BufferError {
    /// Shorthand for [`BufferError::InvalidArgument`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        BufferError::InvalidArgument(reason.into())
    }
}
