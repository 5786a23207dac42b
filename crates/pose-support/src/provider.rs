//! Pose lookup interface

use crate::{FramePair, Pose, PoseError};
use nalgebra::Isometry3;
use std::sync::Arc;

/// Source of device poses, typically the motion tracking service.
///
/// Injected into consumers instead of being reached through a global
/// service handle.
pub trait PoseProvider {
    /// Pose of `frame.target` in `frame.base` valid at `timestamp`
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError>;
}

impl<P: PoseProvider + ?Sized> PoseProvider for &P {
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
        (**self).pose_at(timestamp, frame)
    }
}

impl<P: PoseProvider + ?Sized> PoseProvider for Box<P> {
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
        (**self).pose_at(timestamp, frame)
    }
}

impl<P: PoseProvider + ?Sized> PoseProvider for Arc<P> {
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
        (**self).pose_at(timestamp, frame)
    }
}

/// Provider answering every lookup with the same transform
#[derive(Debug, Clone)]
pub struct StaticPoseProvider {
    transform: Isometry3<f64>,
}

impl StaticPoseProvider {
    pub fn new(transform: Isometry3<f64>) -> Self {
        Self { transform }
    }

    pub fn identity() -> Self {
        Self::new(Isometry3::identity())
    }
}

impl PoseProvider for StaticPoseProvider {
    fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
        Ok(Pose::from_isometry(timestamp, frame, &self.transform))
    }
}
