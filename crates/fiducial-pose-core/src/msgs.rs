//! Plain message types exchanged with the transport layer.
//!
//! Field layout mirrors the common robotics message definitions (`std_msgs`,
//! `geometry_msgs`, `sensor_msgs`, `visualization_msgs`) so the types
//! serialize to the shapes downstream tools expect.

use std::time::Duration;

use nalgebra::{Quaternion as NaQuaternion, UnitQuaternion, Vector3 as NaVector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{rigid_from_parts, RigidTransform};
use crate::time::Time;

/// Timestamp and coordinate frame of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Transform from `header.frame_id` (parent) to `child_frame_id` at `header.stamp`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

impl TransformStamped {
    pub fn new(
        stamp: Time,
        parent: impl Into<String>,
        child: impl Into<String>,
        transform: &RigidTransform,
    ) -> Self {
        Self {
            header: Header::new(stamp, parent),
            child_frame_id: child.into(),
            transform: transform.into(),
        }
    }

    pub fn rigid(&self) -> RigidTransform {
        (&self.transform).into()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vector3Stamped {
    pub header: Header,
    pub vector: Vector3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointStamped {
    pub header: Header,
    pub point: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Arrow,
    Cube,
    Sphere,
    Cylinder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerAction {
    Add,
    Delete,
}

/// Visualization primitive for 3-D viewers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualMarker {
    pub header: Header,
    pub ns: String,
    pub id: i32,
    pub shape: MarkerShape,
    pub action: MarkerAction,
    pub pose: Pose,
    pub scale: Vector3,
    pub color: ColorRgba,
    /// How long the viewer keeps the primitive without a refresh.
    pub lifetime: Duration,
}

/// Calibration message of a (possibly stereo) pinhole camera.
///
/// `k` is the 3x3 intrinsic matrix, `r` the rectification rotation and `p`
/// the 3x4 projection matrix, all row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub distortion_model: String,
    #[serde(default)]
    pub d: Vec<f64>,
    pub k: [f64; 9],
    #[serde(default = "identity3")]
    pub r: [f64; 9],
    pub p: [f64; 12],
}

fn identity3() -> [f64; 9] {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
}

/// Raw image buffer with an encoding tag such as `rgb8` or `mono8`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: String,
    #[serde(default)]
    pub is_bigendian: bool,
    /// Row length in bytes.
    pub step: u32,
    pub data: Vec<u8>,
}

impl From<&RigidTransform> for Transform {
    fn from(iso: &RigidTransform) -> Self {
        let t = iso.translation.vector;
        Self {
            translation: Vector3 {
                x: t.x,
                y: t.y,
                z: t.z,
            },
            rotation: (&iso.rotation).into(),
        }
    }
}

impl From<&Transform> for RigidTransform {
    fn from(t: &Transform) -> Self {
        let q = t.rotation;
        rigid_from_parts(
            NaVector3::new(t.translation.x, t.translation.y, t.translation.z),
            UnitQuaternion::from_quaternion(NaQuaternion::new(q.w, q.x, q.y, q.z)),
        )
    }
}

impl From<&RigidTransform> for Pose {
    fn from(iso: &RigidTransform) -> Self {
        let t = iso.translation.vector;
        Self {
            position: Point {
                x: t.x,
                y: t.y,
                z: t.z,
            },
            orientation: (&iso.rotation).into(),
        }
    }
}

impl From<&UnitQuaternion<f64>> for Quaternion {
    fn from(q: &UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}
