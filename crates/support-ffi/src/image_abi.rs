//! Image buffer manager C functions

use crate::{guarded, lock, write_flag, SupportStatus};
use image_buffer::{
    CopyRegionHandle, ImageBufferConsumer, ImageBufferManager, ImageBufferProducer, ImageError,
    ImageFormat, ImageFrame, PixelFormat,
};
use std::sync::Mutex;
use tracing::debug;

/// C pixel format codes
pub const SUPPORT_PIXEL_FORMAT_NV21: libc::c_int = 0;
pub const SUPPORT_PIXEL_FORMAT_NV12: libc::c_int = 1;
pub const SUPPORT_PIXEL_FORMAT_YV12: libc::c_int = 2;
pub const SUPPORT_PIXEL_FORMAT_RGBA_8888: libc::c_int = 3;

fn pixel_format_from_c(code: libc::c_int) -> Option<PixelFormat> {
    match code {
        SUPPORT_PIXEL_FORMAT_NV21 => Some(PixelFormat::Nv21),
        SUPPORT_PIXEL_FORMAT_NV12 => Some(PixelFormat::Nv12),
        SUPPORT_PIXEL_FORMAT_YV12 => Some(PixelFormat::Yv12),
        SUPPORT_PIXEL_FORMAT_RGBA_8888 => Some(PixelFormat::Rgba8888),
        _ => None,
    }
}

fn pixel_format_to_c(format: PixelFormat) -> libc::c_int {
    match format {
        PixelFormat::Nv21 => SUPPORT_PIXEL_FORMAT_NV21,
        PixelFormat::Nv12 => SUPPORT_PIXEL_FORMAT_NV12,
        PixelFormat::Yv12 => SUPPORT_PIXEL_FORMAT_YV12,
        PixelFormat::Rgba8888 => SUPPORT_PIXEL_FORMAT_RGBA_8888,
    }
}

/// Opaque image buffer manager handle
pub struct ImageBufferHandle {
    producer: Mutex<ImageBufferProducer>,
    consumer: Mutex<ImageBufferConsumer>,
    region: CopyRegionHandle,
}

/// Incoming camera frame (matches the callback payload layout)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CImageFrame {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: libc::c_int,
    pub timestamp: f64,
    pub frame_number: u64,
    pub data: *const u8,
    pub size: usize,
}

/// Front image as seen from C; `data` stays valid until the next
/// `support_image_buffer_manager_get_latest` call on the same handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CImageBuffer {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: libc::c_int,
    pub timestamp: f64,
    pub frame_number: u64,
    pub data: *const u8,
    pub size: usize,
}

/// Create a manager for images of the given geometry.
///
/// # Safety
///
/// `out` must be null or point to writable storage for a handle pointer.
#[no_mangle]
pub unsafe extern "C" fn support_image_buffer_manager_create(
    width: u32,
    height: u32,
    stride: u32,
    format: libc::c_int,
    out: *mut *mut ImageBufferHandle,
) -> SupportStatus {
    if out.is_null() {
        return SupportStatus::InvalidArgument;
    }
    let Some(pixel_format) = pixel_format_from_c(format) else {
        return SupportStatus::InvalidArgument;
    };
    guarded(|| {
        let manager = ImageFormat::new(width, height, stride, pixel_format)
            .map_err(ImageError::from)
            .and_then(ImageBufferManager::new);
        match manager {
            Ok(manager) => {
                let (producer, consumer) = manager.split();
                let region = producer.copy_region();
                let handle = Box::new(ImageBufferHandle {
                    producer: Mutex::new(producer),
                    consumer: Mutex::new(consumer),
                    region,
                });
                *out = Box::into_raw(handle);
                debug!(
                    "Image buffer handle created: {}x{} stride={} {:?}",
                    width, height, stride, pixel_format
                );
                SupportStatus::Success
            }
            Err(e) => (&e).into(),
        }
    })
}

/// Restrict updates to rows `[begin_line, end_line]`, skipping chroma when
/// `y_plane_only` is non-zero. An invalid region leaves the previous one.
///
/// # Safety
///
/// `manager` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn support_image_buffer_manager_set_copy_region(
    manager: *mut ImageBufferHandle,
    begin_line: u32,
    end_line: u32,
    y_plane_only: libc::c_int,
) -> SupportStatus {
    if manager.is_null() {
        return SupportStatus::InvalidArgument;
    }
    let handle = &*manager;
    guarded(|| match handle.region.set(begin_line, end_line, y_plane_only != 0) {
        Ok(()) => SupportStatus::Success,
        Err(e) => (&e).into(),
    })
}

/// Publish a camera frame. Producer thread only.
///
/// # Safety
///
/// `manager` must be null or a live handle; `frame` must be null or point
/// to a frame whose `data` is readable for `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn support_image_buffer_manager_update(
    manager: *mut ImageBufferHandle,
    frame: *const CImageFrame,
) -> SupportStatus {
    if manager.is_null() || frame.is_null() {
        return SupportStatus::InvalidArgument;
    }
    let handle = &*manager;
    let frame = &*frame;
    if frame.data.is_null() && frame.size > 0 {
        return SupportStatus::InvalidArgument;
    }
    let Some(pixel_format) = pixel_format_from_c(frame.format) else {
        return SupportStatus::InvalidArgument;
    };
    guarded(|| {
        let data: &[u8] = if frame.size == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(frame.data, frame.size)
        };
        let format = ImageFormat {
            width: frame.width,
            height: frame.height,
            stride: frame.stride,
            format: pixel_format,
        };
        let image_frame = ImageFrame::new(format, frame.timestamp, frame.frame_number, data);
        match lock(&handle.producer).update(&image_frame) {
            Ok(_) => SupportStatus::Success,
            Err(e) => (&e).into(),
        }
    })
}

/// Fetch the latest image. Consumer thread only.
///
/// # Safety
///
/// `manager` must be null or a live handle; `out` must be null or writable;
/// `out_is_new` may be null.
#[no_mangle]
pub unsafe extern "C" fn support_image_buffer_manager_get_latest(
    manager: *mut ImageBufferHandle,
    out: *mut CImageBuffer,
    out_is_new: *mut libc::c_int,
) -> SupportStatus {
    if manager.is_null() || out.is_null() {
        return SupportStatus::InvalidArgument;
    }
    let handle = &*manager;
    guarded(|| {
        let mut consumer = lock(&handle.consumer);
        let (image, is_new) = consumer.get_latest();
        *out = CImageBuffer {
            width: image.width(),
            height: image.height(),
            stride: image.stride(),
            format: pixel_format_to_c(image.pixel_format()),
            timestamp: image.timestamp(),
            frame_number: image.frame_number(),
            data: image.data().as_ptr(),
            size: image.data().len(),
        };
        write_flag(out_is_new, is_new);
        SupportStatus::Success
    })
}

/// Free a manager and its three buffers.
///
/// # Safety
///
/// `manager` must be null or a live handle, with no other call on it in
/// flight or following.
#[no_mangle]
pub unsafe extern "C" fn support_image_buffer_manager_destroy(
    manager: *mut ImageBufferHandle,
) -> SupportStatus {
    if manager.is_null() {
        return SupportStatus::InvalidArgument;
    }
    drop(Box::from_raw(manager));
    debug!("Image buffer handle destroyed");
    SupportStatus::Success
}
