//! Point cloud manager C functions

use crate::{guarded, lock, write_flag, SupportStatus};
use point_cloud::{PointCloudConsumer, PointCloudFrame, PointCloudManager, PointCloudProducer};
use std::sync::Mutex;
use tracing::debug;

/// Opaque point cloud manager handle
pub struct PointCloudHandle {
    producer: Mutex<PointCloudProducer>,
    consumer: Mutex<PointCloudConsumer>,
}

/// Point cloud as seen from C.
///
/// `points` holds `num_points` xyz triples and stays valid until the next
/// `support_point_cloud_manager_get_latest` call on the same handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CPointCloud {
    pub timestamp: f64,
    pub num_points: u32,
    pub points: *const f32,
}

/// Create a manager for clouds of up to `max_points` points.
///
/// # Safety
///
/// `out` must be null or point to writable storage for a handle pointer.
#[no_mangle]
pub unsafe extern "C" fn support_point_cloud_manager_create(
    max_points: u32,
    out: *mut *mut PointCloudHandle,
) -> SupportStatus {
    if out.is_null() {
        return SupportStatus::InvalidArgument;
    }
    guarded(|| match PointCloudManager::new(max_points as usize) {
        Ok(manager) => {
            let (producer, consumer) = manager.split();
            let handle = Box::new(PointCloudHandle {
                producer: Mutex::new(producer),
                consumer: Mutex::new(consumer),
            });
            *out = Box::into_raw(handle);
            debug!("Point cloud handle created: max_points={}", max_points);
            SupportStatus::Success
        }
        Err(e) => (&e).into(),
    })
}

/// Publish a cloud of `num_points` xyz triples. Producer thread only.
///
/// An empty cloud is skipped and still reports success.
///
/// # Safety
///
/// `manager` must be null or a live handle from
/// `support_point_cloud_manager_create`; `points` must be null or readable
/// for `3 * num_points` floats.
#[no_mangle]
pub unsafe extern "C" fn support_point_cloud_manager_update(
    manager: *mut PointCloudHandle,
    timestamp: f64,
    points: *const f32,
    num_points: u32,
) -> SupportStatus {
    if manager.is_null() || (points.is_null() && num_points > 0) {
        return SupportStatus::InvalidArgument;
    }
    let handle = &*manager;
    guarded(|| {
        let points: &[[f32; 3]] = if num_points == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(points.cast::<[f32; 3]>(), num_points as usize)
        };
        match lock(&handle.producer).update(&PointCloudFrame::new(timestamp, points)) {
            Ok(_) => SupportStatus::Success,
            Err(e) => (&e).into(),
        }
    })
}

/// Fetch the latest cloud. Consumer thread only.
///
/// Before the first update the cloud is empty with `num_points == 0`.
///
/// # Safety
///
/// `manager` must be null or a live handle; `out` must be null or writable;
/// `out_is_new` may be null.
#[no_mangle]
pub unsafe extern "C" fn support_point_cloud_manager_get_latest(
    manager: *mut PointCloudHandle,
    out: *mut CPointCloud,
    out_is_new: *mut libc::c_int,
) -> SupportStatus {
    if manager.is_null() || out.is_null() {
        return SupportStatus::InvalidArgument;
    }
    let handle = &*manager;
    guarded(|| {
        let mut consumer = lock(&handle.consumer);
        let (cloud, is_new) = consumer.get_latest();
        *out = CPointCloud {
            timestamp: cloud.timestamp(),
            num_points: cloud.points().len() as u32,
            points: cloud.points().as_ptr().cast::<f32>(),
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
pub unsafe extern "C" fn support_point_cloud_manager_destroy(
    manager: *mut PointCloudHandle,
) -> SupportStatus {
    if manager.is_null() {
        return SupportStatus::InvalidArgument;
    }
    drop(Box::from_raw(manager));
    debug!("Point cloud handle destroyed");
    SupportStatus::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn create(max_points: u32) -> *mut PointCloudHandle {
        let mut handle = ptr::null_mut();
        let status = unsafe { support_point_cloud_manager_create(max_points, &mut handle) };
        assert_eq!(status, SupportStatus::Success);
        handle
    }

    #[test]
    fn test_null_arguments() {
        unsafe {
            assert_eq!(
                support_point_cloud_manager_create(10, ptr::null_mut()),
                SupportStatus::InvalidArgument
            );
            assert_eq!(
                support_point_cloud_manager_update(ptr::null_mut(), 1.0, ptr::null(), 0),
                SupportStatus::InvalidArgument
            );
            let mut cloud = CPointCloud {
                timestamp: 0.0,
                num_points: 0,
                points: ptr::null(),
            };
            let status = support_point_cloud_manager_get_latest(
                ptr::null_mut(),
                &mut cloud,
                ptr::null_mut(),
            );
            assert_eq!(status, SupportStatus::InvalidArgument);
            assert_eq!(
                support_point_cloud_manager_destroy(ptr::null_mut()),
                SupportStatus::InvalidArgument
            );
        }
    }

    #[test]
    fn test_nan_timestamp_does_not_block_later_clouds() {
        let handle = create(4);
        let points = [1.0f32, 2.0, 3.0];
        let mut cloud = CPointCloud {
            timestamp: 0.0,
            num_points: 0,
            points: ptr::null(),
        };
        let mut is_new: libc::c_int = 0;

        unsafe {
            assert_eq!(
                support_point_cloud_manager_update(handle, f64::NAN, points.as_ptr(), 1),
                SupportStatus::Success
            );
            for timestamp in [1.0, 2.0] {
                assert_eq!(
                    support_point_cloud_manager_update(handle, timestamp, points.as_ptr(), 1),
                    SupportStatus::Success
                );
            }
            assert_eq!(
                support_point_cloud_manager_get_latest(handle, &mut cloud, &mut is_new),
                SupportStatus::Success
            );
            assert_eq!(is_new, 1);
            assert_eq!(cloud.timestamp, 2.0);
            assert_eq!(cloud.num_points, 1);
            support_point_cloud_manager_destroy(handle);
        }
    }

    #[test]
    fn test_zero_capacity() {
        let mut handle = ptr::null_mut();
        let status = unsafe { support_point_cloud_manager_create(0, &mut handle) };
        assert_eq!(status, SupportStatus::InvalidArgument);
        assert!(handle.is_null());
    }

    #[test]
    fn test_round_trip_through_c() {
        let handle = create(4);
        let points = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut cloud = CPointCloud {
            timestamp: 0.0,
            num_points: 0,
            points: ptr::null(),
        };
        let mut is_new: libc::c_int = -1;

        unsafe {
            assert_eq!(
                support_point_cloud_manager_get_latest(handle, &mut cloud, &mut is_new),
                SupportStatus::Success
            );
            assert_eq!(is_new, 0);
            assert_eq!(cloud.num_points, 0);

            assert_eq!(
                support_point_cloud_manager_update(handle, 1.5, points.as_ptr(), 2),
                SupportStatus::Success
            );
            assert_eq!(
                support_point_cloud_manager_get_latest(handle, &mut cloud, &mut is_new),
                SupportStatus::Success
            );
            assert_eq!(is_new, 1);
            assert_eq!(cloud.timestamp, 1.5);
            assert_eq!(cloud.num_points, 2);
            let view = std::slice::from_raw_parts(cloud.points, 6);
            assert_eq!(view, &points);

            let oversized = [0.5f32; 15];
            assert_eq!(
                support_point_cloud_manager_update(handle, 2.0, oversized.as_ptr(), 5),
                SupportStatus::CapacityExceeded
            );
            assert_eq!(support_point_cloud_manager_destroy(handle), SupportStatus::Success);
        }
    }
}
