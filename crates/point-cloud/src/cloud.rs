//! Point cloud sample types

use nalgebra::Isometry3;
use pose_support::transform_points;
use triple_buffer::{try_with_capacity, BufferError, Sample};

/// Borrowed view of one depth callback payload
#[derive(Debug, Clone, Copy)]
pub struct PointCloudFrame<'a> {
    /// Capture timestamp (seconds)
    pub timestamp: f64,
    /// Points in the depth camera frame (meters)
    pub points: &'a [[f32; 3]],
}

impl<'a> PointCloudFrame<'a> {
    pub fn new(timestamp: f64, points: &'a [[f32; 3]]) -> Self {
        Self { timestamp, points }
    }
}

/// Pre-allocated, timestamped point cloud slot
#[derive(Debug, Clone)]
pub struct PointCloud {
    timestamp: f64,
    points: Vec<[f32; 3]>,
}

impl PointCloud {
    /// Allocate an empty cloud able to hold `max_points` without growing
    pub fn with_capacity(max_points: usize) -> Result<Self, BufferError> {
        Ok(Self {
            timestamp: 0.0,
            points: try_with_capacity(max_points)?,
        })
    }

    /// Capture timestamp (seconds)
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Points in the depth camera frame
    pub fn points(&self) -> &[[f32; 3]] {
        &self.points
    }

    /// Borrow this cloud as a frame, e.g. to forward it to another manager
    pub fn as_frame(&self) -> PointCloudFrame<'_> {
        PointCloudFrame::new(self.timestamp, &self.points)
    }

    /// Mean z of all points, `None` for an empty cloud
    pub fn average_depth(&self) -> Option<f32> {
        if self.points.is_empty() {
            return None;
        }
        let sum: f64 = self.points.iter().map(|p| p[2] as f64).sum();
        Some((sum / self.points.len() as f64) as f32)
    }

    /// Copy of the points moved into another frame by `transform`
    pub fn transformed(&self, transform: &Isometry3<f64>) -> Vec<[f32; 3]> {
        let mut points = self.points.clone();
        transform_points(transform, &mut points);
        points
    }

    /// Copy `frame` into this slot. Oversized frames leave the slot untouched.
    pub(crate) fn fill(&mut self, frame: &PointCloudFrame<'_>) -> Result<(), BufferError> {
        if frame.points.len() > self.points.capacity() {
            return Err(BufferError::CapacityExceeded {
                len: frame.points.len(),
                capacity: self.points.capacity(),
            });
        }
        self.points.clear();
        self.points.extend_from_slice(frame.points);
        self.timestamp = frame.timestamp;
        Ok(())
    }
}

impl Sample for PointCloud {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn capacity(&self) -> usize {
        self.points.capacity()
    }

    fn copy_from(&mut self, source: &Self) -> Result<(), BufferError> {
        self.fill(&source.as_frame())
    }
}
