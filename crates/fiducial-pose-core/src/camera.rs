//! Pinhole camera model built from a calibration message.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{rigid_from_parts, RigidTransform};
use crate::msgs::CameraInfo;

/// Intrinsics and distortion handed to the marker detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// 3x3 camera matrix `[fx 0 cx; 0 fy cy; 0 0 1]`.
    pub camera_matrix: Matrix3<f64>,
    /// `k1, k2, p1, p2`; all zero for rectified input.
    pub distortion: [f64; 4],
    pub width: u32,
    pub height: u32,
    /// Whether the model describes rectified images (projection matrix, no distortion).
    pub rectified: bool,
}

impl CameraModel {
    /// Convert a calibration message.
    ///
    /// Rectified input takes the left 3x3 block of `P` and zero distortion.
    /// Raw input takes `K` and the first four coefficients of `D`.
    pub fn from_camera_info(info: &CameraInfo, rectified: bool) -> Self {
        let (camera_matrix, distortion) = if rectified {
            let p = &info.p;
            (
                Matrix3::new(p[0], p[1], p[2], p[4], p[5], p[6], p[8], p[9], p[10]),
                [0.0; 4],
            )
        } else {
            let mut d = [0.0; 4];
            for (dst, src) in d.iter_mut().zip(info.d.iter()) {
                *dst = *src;
            }
            (Matrix3::from_row_slice(&info.k), d)
        };
        Self {
            camera_matrix,
            distortion,
            width: info.width,
            height: info.height,
            rectified,
        }
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    /// Usable for 3-D pose recovery: finite positive focal lengths and a known image size.
    pub fn is_valid(&self) -> bool {
        self.camera_matrix.iter().all(|v| v.is_finite())
            && self.fx() > 0.0
            && self.fy() > 0.0
            && self.width > 0
            && self.height > 0
    }
}

/// Baseline offset of a stereo pair's right camera, read from its projection matrix.
///
/// Returns the translation `(-Tx/fx, -Ty/fy, 0)` with `Tx = P[3]`, `Ty = P[7]`,
/// or `None` when the focal terms are zero. Not applied by the pipeline, which
/// runs with an identity offset.
pub fn stereo_offset_from_projection(info: &CameraInfo) -> Option<RigidTransform> {
    let p = &info.p;
    if p[0] == 0.0 || p[5] == 0.0 {
        return None;
    }
    Some(rigid_from_parts(
        Vector3::new(-p[3] / p[0], -p[7] / p[5], 0.0),
        nalgebra::UnitQuaternion::identity(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::Header;
    use approx::assert_relative_eq;

    fn info() -> CameraInfo {
        CameraInfo {
            header: Header::default(),
            width: 640,
            height: 480,
            distortion_model: "plumb_bob".to_string(),
            d: vec![0.1, -0.05, 0.001, 0.002, 0.01],
            k: [600.0, 0.0, 321.0, 0.0, 601.0, 239.0, 0.0, 0.0, 1.0],
            r: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            p: [
                590.0, 0.0, 318.0, -35.4, 0.0, 590.0, 242.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            ],
        }
    }

    #[test]
    fn rectified_model_uses_projection_matrix() {
        let model = CameraModel::from_camera_info(&info(), true);
        assert_eq!(model.fx(), 590.0);
        assert_eq!(model.cy(), 242.0);
        assert_eq!(model.distortion, [0.0; 4]);
        assert!(model.is_valid());
    }

    #[test]
    fn raw_model_uses_intrinsics_and_distortion() {
        let model = CameraModel::from_camera_info(&info(), false);
        assert_eq!(model.fx(), 600.0);
        assert_eq!(model.cx(), 321.0);
        assert_eq!(model.distortion, [0.1, -0.05, 0.001, 0.002]);
    }

    #[test]
    fn short_distortion_is_zero_padded() {
        let mut msg = info();
        msg.d = vec![0.2];
        let model = CameraModel::from_camera_info(&msg, false);
        assert_eq!(model.distortion, [0.2, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_focal_length_is_invalid() {
        let mut msg = info();
        msg.p[0] = 0.0;
        assert!(!CameraModel::from_camera_info(&msg, true).is_valid());
        assert!(stereo_offset_from_projection(&msg).is_none());
    }

    #[test]
    fn stereo_offset_reads_baseline() {
        let offset = stereo_offset_from_projection(&info()).expect("offset");
        assert_relative_eq!(offset.translation.vector.x, 0.06, epsilon = 1e-12);
        assert_eq!(offset.translation.vector.y, 0.0);
    }
}
