//! Orientation override that suppresses roll/pitch jitter of planar markers.
//!
//! This is a targeted workaround for one camera mounting, not a rotation
//! filter. Angles are read with swapped axes: the rotation's roll channel is
//! taken as "pitch", its pitch channel as "yaw" and its yaw channel as
//! "roll". Only that "yaw" survives; the rebuilt rotation has a fixed flip of
//! [`FLIP_ROLL`] about X, the kept angle about Y and nothing about Z.
//! Translation passes through untouched.

use fiducial_pose_core::{rigid_from_parts, RigidTransform, Rpy};

/// Fixed roll of the corrected orientation, in radians.
pub const FLIP_ROLL: f64 = 3.1415;

/// Angles of a rotation under the swapped-axis reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwappedRpy {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl SwappedRpy {
    pub fn of(transform: &RigidTransform) -> Self {
        let plain = Rpy::of(&transform.rotation);
        Self {
            pitch: plain.roll,
            yaw: plain.pitch,
            roll: plain.yaw,
        }
    }
}

/// Replace the orientation of a camera-relative marker pose, keeping only
/// the swapped-axis yaw.
pub fn correct_orientation(raw: &RigidTransform) -> RigidTransform {
    let angles = SwappedRpy::of(raw);
    log::debug!(
        "raw marker angles roll={:.4} pitch={:.4} yaw={:.4}",
        angles.roll,
        angles.pitch,
        angles.yaw
    );
    let rotation = Rpy::new(FLIP_ROLL, angles.yaw, 0.0).to_rotation();
    rigid_from_parts(raw.translation.vector, rotation)
}
