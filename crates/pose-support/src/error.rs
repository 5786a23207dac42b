//! Pose Error Types

use crate::FramePair;
use thiserror::Error;

/// Errors from pose lookups and pose arithmetic
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseError {
    /// The provider has no pose for this timestamp and frame pair
    #[error("No pose available for {frame} at t={timestamp:.6}")]
    Unavailable { timestamp: f64, frame: FramePair },

    /// The provider returned a pose that is not usable
    #[error("Pose at t={timestamp:.6} is not valid")]
    InvalidPose { timestamp: f64 },

    /// Poses cannot be chained because their frames do not meet
    #[error("Cannot compose {first} with {second}")]
    FrameMismatch { first: FramePair, second: FramePair },

    /// Provider-specific failure
    #[error("Pose provider error: {0}")]
    Provider(String),
}
