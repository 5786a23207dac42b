//! Simulated vendor sensor service
//!
//! Stands in for the depth and color camera callbacks: each sensor runs on
//! its own OS thread and publishes into the producer half of a manager.

use crate::config::{ColorConfig, DepthConfig};
use image_buffer::{ImageBufferProducer, ImageFormat, ImageFrame};
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use point_cloud::{PointCloudFrame, PointCloudProducer};
use pose_support::{CoordinateFrame, FramePair, Pose, PoseError, PoseProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared sensor clock, seconds since the service started
#[derive(Debug, Clone, Copy)]
pub struct SensorClock {
    start: Instant,
}

impl SensorClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Device moving at constant velocity and yaw rate from the start of service
#[derive(Debug, Clone)]
pub struct TrajectoryPoseProvider {
    velocity: Vector3<f64>,
    yaw_rate: f64,
}

impl TrajectoryPoseProvider {
    pub fn new(velocity: Vector3<f64>, yaw_rate: f64) -> Self {
        Self { velocity, yaw_rate }
    }

    /// Device pose in the start-of-service frame at `timestamp`
    pub fn device_pose(&self, timestamp: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.velocity * timestamp),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.yaw_rate * timestamp),
        )
    }
}

impl Default for TrajectoryPoseProvider {
    fn default() -> Self {
        Self::new(Vector3::new(0.2, 0.0, 0.0), 0.1)
    }
}

impl PoseProvider for TrajectoryPoseProvider {
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
        let supported_target = matches!(
            frame.target,
            CoordinateFrame::Device | CoordinateFrame::CameraDepth | CoordinateFrame::CameraColor
        );
        if timestamp < 0.0 || frame.base != CoordinateFrame::StartOfService || !supported_target {
            return Err(PoseError::Unavailable { timestamp, frame });
        }

        // Cameras are rigidly mounted at the device origin.
        Ok(Pose::from_isometry(timestamp, frame, &self.device_pose(timestamp)))
    }
}

/// Handle to a running sensor thread
pub struct SensorThread {
    name: &'static str,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl SensorThread {
    /// Stop the thread and return how many callbacks it delivered
    pub fn stop(self) -> u64 {
        self.shutdown.store(true, Ordering::SeqCst);
        match self.handle.join() {
            Ok(delivered) => {
                debug!("{} sensor stopped after {} frames", self.name, delivered);
                delivered
            }
            Err(_) => {
                warn!("{} sensor thread panicked", self.name);
                0
            }
        }
    }
}

fn interval(rate_hz: f64) -> Duration {
    Duration::from_secs_f64(1.0 / rate_hz)
}

/// Synthetic depth scan: a grid over a slowly breathing surface 1-3 m away
pub fn fill_depth_points(points: &mut Vec<[f32; 3]>, count: usize, timestamp: f64) {
    points.clear();
    let side = (count as f64).sqrt().ceil().max(1.0) as usize;
    let phase = timestamp as f32;
    for i in 0..count {
        let u = (i % side) as f32 / side as f32 - 0.5;
        let v = (i / side) as f32 / side as f32 - 0.5;
        let z = 2.0 + 0.5 * (phase + 4.0 * u).sin() * (3.0 * v).cos();
        points.push([u * z, v * z, z]);
    }
}

/// Synthetic camera frame: luma ramps with the frame number, chroma is neutral
pub fn fill_color_frame(data: &mut [u8], format: &ImageFormat, frame_number: u64) {
    let luma = format.luma_plane().size().min(data.len());
    let level = (frame_number % 256) as u8;
    data[..luma].fill(level);
    data[luma..].fill(128);
}

/// Spawn the depth camera thread
pub fn spawn_depth(
    mut producer: PointCloudProducer,
    config: DepthConfig,
    clock: SensorClock,
) -> SensorThread {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    let handle = std::thread::spawn(move || {
        let period = interval(config.rate_hz);
        let mut points = Vec::with_capacity(config.points_per_frame);
        let mut delivered = 0u64;

        while !shutdown_clone.load(Ordering::SeqCst) {
            let timestamp = clock.now();
            fill_depth_points(&mut points, config.points_per_frame, timestamp);
            match producer.update(&PointCloudFrame::new(timestamp, &points)) {
                Ok(true) => delivered += 1,
                Ok(false) => debug!("Depth frame at t={:.3} skipped", timestamp),
                Err(e) => warn!("Depth update failed: {}", e),
            }
            std::thread::sleep(period);
        }
        delivered
    });

    SensorThread {
        name: "depth",
        shutdown,
        handle,
    }
}

/// Spawn the color camera thread
pub fn spawn_color(
    mut producer: ImageBufferProducer,
    config: ColorConfig,
    clock: SensorClock,
) -> SensorThread {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    let handle = std::thread::spawn(move || {
        let period = interval(config.rate_hz);
        let format = *producer.format();
        let mut data = vec![0u8; format.buffer_size()];
        let mut frame_number = 0u64;
        let mut delivered = 0u64;

        while !shutdown_clone.load(Ordering::SeqCst) {
            frame_number += 1;
            fill_color_frame(&mut data, &format, frame_number);
            let frame = ImageFrame::new(format, clock.now(), frame_number, &data);
            match producer.update(&frame) {
                Ok(true) => delivered += 1,
                Ok(false) => debug!("Color frame {} skipped", frame_number),
                Err(e) => warn!("Color update failed: {}", e),
            }
            std::thread::sleep(period);
        }
        delivered
    });

    SensorThread {
        name: "color",
        shutdown,
        handle,
    }
}
