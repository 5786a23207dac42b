//! Pose Support
//!
//! Device poses keyed by timestamp and coordinate frame pair, the
//! [`PoseProvider`] interface through which the motion tracking service is
//! queried, and helpers bridging poses to transform matrices.

mod error;
mod frame;
mod pose;
mod provider;

pub use error::PoseError;
pub use frame::{CoordinateFrame, FramePair};
pub use pose::{transform_points, Pose, PoseStatus};
pub use provider::{PoseProvider, StaticPoseProvider};
