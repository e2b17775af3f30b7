//! Rigid-motion helpers on top of `nalgebra::Isometry3`.
//!
//! Composition follows `nalgebra`: `a * b` applies `b` first, then `a`, so a
//! point expressed in frame `c` maps into frame `a` via `t_ab * t_bc`.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

/// Translation plus unit-quaternion rotation.
///
/// The rotation is stored as `UnitQuaternion`, so it stays normalized through
/// every composition and inversion.
pub type RigidTransform = Isometry3<f64>;

/// Roll/pitch/yaw triple in radians (fixed axes X, Y, Z; `R = Rz(yaw) * Ry(pitch) * Rx(roll)`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rpy {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Rpy {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    pub fn of(rotation: &UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = rotation.euler_angles();
        Self { roll, pitch, yaw }
    }

    pub fn to_rotation(self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }
}

pub fn rigid_from_parts(
    translation: Vector3<f64>,
    rotation: UnitQuaternion<f64>,
) -> RigidTransform {
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

/// Interpolate between two rigid transforms: linear in translation, spherical in rotation.
///
/// Falls back to the nearer endpoint's rotation when the two rotations are
/// antipodal and slerp is undefined.
pub fn interpolate(a: &RigidTransform, b: &RigidTransform, t: f64) -> RigidTransform {
    let t = t.clamp(0.0, 1.0);
    let translation = a.translation.vector.lerp(&b.translation.vector, t);
    let rotation = a
        .rotation
        .try_slerp(&b.rotation, t, 1.0e-9)
        .unwrap_or(if t < 0.5 { a.rotation } else { b.rotation });
    rigid_from_parts(translation, rotation)
}
