//! Camera Image Exchange
//!
//! Color camera frames delivered on the vendor callback thread are copied
//! into a triple buffer and picked up by render or detection loops.
//! Supports:
//! - NV21 / NV12 / YV12 4:2:0 and packed RGBA frames
//! - Source frames with a different row stride than the buffer
//! - Scan-line region restriction to bound the callback-side copy

pub mod buffer;
pub mod format;
pub mod manager;
pub mod region;

pub use buffer::{ImageBuffer, ImageFrame};
pub use format::{ImageFormat, PixelFormat, Plane};
pub use manager::{ImageBufferConsumer, ImageBufferManager, ImageBufferProducer};
pub use region::{CopyRegion, CopyRegionHandle};

use thiserror::Error;
use triple_buffer::BufferError;

/// Image buffer error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("Invalid copy region [{begin_line}, {end_line}] for height {height}")]
    InvalidRegion {
        begin_line: u32,
        end_line: u32,
        height: u32,
    },

    #[error("Frame format {actual:?} does not match buffer format {expected:?}")]
    FormatMismatch {
        expected: ImageFormat,
        actual: ImageFormat,
    },

    #[error("Frame holds {actual} bytes, layout needs {expected}")]
    ShortFrame { expected: usize, actual: usize },
}

impl ImageError {
    /// Whether the caller passed a bad argument, as opposed to a resource failure
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            ImageError::Buffer(BufferError::InvalidArgument(_)) => true,
            ImageError::Buffer(_) => false,
            _ => true,
        }
    }
}
