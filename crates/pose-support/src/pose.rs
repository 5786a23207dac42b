//! Pose type and matrix bridging

use crate::{FramePair, PoseError};
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Tracking status attached to a pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseStatus {
    Initializing,
    Valid,
    Invalid,
    Unknown,
}

/// Rigid transform `T_base_target` at a given timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Timestamp (seconds, sensor clock)
    pub timestamp: f64,
    /// Translation in meters
    pub translation: [f64; 3],
    /// Orientation quaternion as (x, y, z, w)
    pub orientation: [f64; 4],
    pub status: PoseStatus,
    pub frame: FramePair,
}

impl Pose {
    /// Identity transform between the two frames of `frame`
    pub fn identity(timestamp: f64, frame: FramePair) -> Self {
        Self {
            timestamp,
            translation: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            status: PoseStatus::Valid,
            frame,
        }
    }

    /// Build a valid pose from an isometry
    pub fn from_isometry(timestamp: f64, frame: FramePair, isometry: &Isometry3<f64>) -> Self {
        let t = isometry.translation.vector;
        let q = isometry.rotation.quaternion();
        Self {
            timestamp,
            translation: [t.x, t.y, t.z],
            orientation: [q.i, q.j, q.k, q.w],
            status: PoseStatus::Valid,
            frame,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == PoseStatus::Valid
    }

    /// Convert to an isometry. Fails on a degenerate quaternion.
    pub fn to_isometry(&self) -> Result<Isometry3<f64>, PoseError> {
        let [x, y, z, w] = self.orientation;
        let rotation = UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f64::EPSILON)
            .ok_or(PoseError::InvalidPose {
                timestamp: self.timestamp,
            })?;
        let [tx, ty, tz] = self.translation;
        Ok(Isometry3::from_parts(Translation3::new(tx, ty, tz), rotation))
    }

    /// Column-major 4x4 homogeneous matrix, the layout GL uniforms expect
    pub fn to_matrix(&self) -> Result<[f64; 16], PoseError> {
        let homogeneous = self.to_isometry()?.to_homogeneous();
        let mut matrix = [0.0; 16];
        matrix.copy_from_slice(homogeneous.as_slice());
        Ok(matrix)
    }

    /// The inverse transform `T_target_base`
    pub fn inverse(&self) -> Result<Pose, PoseError> {
        let inverse = self.to_isometry()?.inverse();
        Ok(Pose {
            status: self.status,
            ..Pose::from_isometry(self.timestamp, self.frame.reversed(), &inverse)
        })
    }

    /// Chain `T_a_b` (self) with `T_b_c` (other) into `T_a_c`.
    ///
    /// The result keeps this pose's timestamp and is only valid when both
    /// inputs are.
    pub fn compose(&self, other: &Pose) -> Result<Pose, PoseError> {
        if self.frame.target != other.frame.base {
            return Err(PoseError::FrameMismatch {
                first: self.frame,
                second: other.frame,
            });
        }
        let chained = self.to_isometry()? * other.to_isometry()?;
        let frame = FramePair::new(self.frame.base, other.frame.target);
        let status = if self.is_valid() && other.is_valid() {
            PoseStatus::Valid
        } else {
            PoseStatus::Invalid
        };
        Ok(Pose {
            status,
            ..Pose::from_isometry(self.timestamp, frame, &chained)
        })
    }
}

/// Apply `transform` to every point in place
pub fn transform_points(transform: &Isometry3<f64>, points: &mut [[f32; 3]]) {
    for point in points.iter_mut() {
        let p = transform.transform_point(&Point3::new(
            point[0] as f64,
            point[1] as f64,
            point[2] as f64,
        ));
        *point = [p.x as f32, p.y as f32, p.z as f32];
    }
}
