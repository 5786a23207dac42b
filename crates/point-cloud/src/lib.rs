//! Depth Point Cloud Exchange
//!
//! Point clouds arrive from the depth camera callback at their own rate and
//! are consumed by render or meshing loops. [`PointCloudManager`] hands the
//! newest cloud across with the triple buffer and can pair it with the
//! device pose at the cloud's own timestamp.

pub mod cloud;
pub mod manager;

pub use cloud::{PointCloud, PointCloudFrame};
pub use manager::{LatestWithPose, PointCloudConsumer, PointCloudManager, PointCloudProducer};

use pose_support::PoseError;
use thiserror::Error;
use triple_buffer::BufferError;

/// Point cloud error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PointCloudError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("Pose lookup failed: {0}")]
    Pose(#[from] PoseError),

    /// No point cloud has been published yet
    #[error("No point cloud available")]
    NoData,
}
