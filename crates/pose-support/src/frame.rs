//! Coordinate frames

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate frames known to the motion tracking service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFrame {
    GlobalWgs84,
    /// Origin of a loaded or learned area description
    AreaDescription,
    /// Device pose when the service started
    StartOfService,
    PreviousDevicePose,
    Device,
    Imu,
    Display,
    CameraColor,
    CameraDepth,
    CameraFisheye,
}

impl fmt::Display for CoordinateFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinateFrame::GlobalWgs84 => "global_wgs84",
            CoordinateFrame::AreaDescription => "area_description",
            CoordinateFrame::StartOfService => "start_of_service",
            CoordinateFrame::PreviousDevicePose => "previous_device_pose",
            CoordinateFrame::Device => "device",
            CoordinateFrame::Imu => "imu",
            CoordinateFrame::Display => "display",
            CoordinateFrame::CameraColor => "camera_color",
            CoordinateFrame::CameraDepth => "camera_depth",
            CoordinateFrame::CameraFisheye => "camera_fisheye",
        };
        f.write_str(name)
    }
}

/// A pose of `target` expressed in `base`, i.e. the transform `T_base_target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramePair {
    pub base: CoordinateFrame,
    pub target: CoordinateFrame,
}

impl FramePair {
    pub fn new(base: CoordinateFrame, target: CoordinateFrame) -> Self {
        Self { base, target }
    }

    /// Device relative to the start-of-service origin
    pub fn device_in_start_of_service() -> Self {
        Self::new(CoordinateFrame::StartOfService, CoordinateFrame::Device)
    }

    /// The pair describing the inverse transform
    pub fn reversed(self) -> Self {
        Self::new(self.target, self.base)
    }
}

impl fmt::Display for FramePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.base, self.target)
    }
}
