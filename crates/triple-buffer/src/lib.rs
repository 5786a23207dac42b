//! Triple-Buffered Sample Exchange
//!
//! Hands the most recent sensor sample from a callback (producer) thread to
//! a render or compute (consumer) thread without either side waiting on the
//! other. Three pre-allocated slots rotate between the Back, Shared and
//! Front roles; a swap only exchanges slot handles under a short lock.

mod buffer;
mod error;

pub use buffer::{BufferManager, BufferStats, Consumer, Producer};
pub use error::BufferError;

/// One timestamped unit of sensor payload held in a pre-allocated slot.
pub trait Sample {
    /// Capture timestamp (seconds, sensor clock)
    fn timestamp(&self) -> f64;

    /// Logical length of the payload (points, bytes, ...)
    fn len(&self) -> usize;

    /// Maximum logical length this slot was allocated for
    fn capacity(&self) -> usize;

    /// Copy another sample of the same kind into this slot.
    ///
    /// Must not allocate when `source.len() <= self.capacity()`.
    fn copy_from(&mut self, source: &Self) -> Result<(), BufferError>;

    /// Check if the sample carries no payload
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reserve an empty vector for exactly `capacity` elements.
///
/// Reports allocation failure as [`BufferError::AllocationFailure`] instead
/// of aborting the process.
pub fn try_with_capacity<E>(capacity: usize) -> Result<Vec<E>, BufferError> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(capacity)
        .map_err(|_| BufferError::AllocationFailure { capacity })?;
    Ok(storage)
}
