//! C ABI for the Sample Buffer Managers
//!
//! Exposes the point cloud and image buffer managers to JNI glue and other
//! native callers through opaque handles and status codes. Each handle keeps
//! its producer and consumer halves behind separate mutexes, so the vendor
//! callback thread and the render thread can call in concurrently without
//! contending with each other.

pub mod image_abi;
pub mod point_cloud_abi;

pub use image_abi::{CImageBuffer, CImageFrame, ImageBufferHandle};
pub use point_cloud_abi::{CPointCloud, PointCloudHandle};

use ::point_cloud::PointCloudError as CloudError;
use image_buffer::ImageError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use triple_buffer::BufferError;

/// Status codes returned by every exported function
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    Success = 0,
    InvalidArgument = -1,
    AllocationFailure = -2,
    CapacityExceeded = -3,
    NoData = -4,
    Error = -5,
}

impl From<&BufferError> for SupportStatus {
    fn from(err: &BufferError) -> Self {
        match err {
            BufferError::InvalidArgument(_) => SupportStatus::InvalidArgument,
            BufferError::AllocationFailure { .. } => SupportStatus::AllocationFailure,
            BufferError::CapacityExceeded { .. } => SupportStatus::CapacityExceeded,
        }
    }
}

impl From<&CloudError> for SupportStatus {
    fn from(err: &CloudError) -> Self {
        match err {
            CloudError::Buffer(e) => e.into(),
            CloudError::Pose(_) => SupportStatus::Error,
            CloudError::NoData => SupportStatus::NoData,
        }
    }
}

impl From<&ImageError> for SupportStatus {
    fn from(err: &ImageError) -> Self {
        match err {
            ImageError::Buffer(e) => e.into(),
            _ if err.is_invalid_argument() => SupportStatus::InvalidArgument,
            _ => SupportStatus::Error,
        }
    }
}

/// Run `body`, turning a panic into [`SupportStatus::Error`] so it never
/// unwinds into the caller's frames.
pub(crate) fn guarded<F>(body: F) -> SupportStatus
where
    F: FnOnce() -> SupportStatus,
{
    catch_unwind(AssertUnwindSafe(body)).unwrap_or(SupportStatus::Error)
}

pub(crate) fn lock<T>(half: &Mutex<T>) -> MutexGuard<'_, T> {
    half.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write a boolean through an optional C out-parameter
pub(crate) unsafe fn write_flag(out: *mut libc::c_int, value: bool) {
    if !out.is_null() {
        *out = libc::c_int::from(value);
    }
}
