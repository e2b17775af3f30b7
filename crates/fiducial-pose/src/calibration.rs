//! One-shot camera calibration gate.

use fiducial_pose_core::{msgs::CameraInfo, CameraModel, RigidTransform};

/// Camera state after calibration arrived.
#[derive(Clone, Debug, PartialEq)]
pub struct Calibration {
    pub camera: CameraModel,
    /// Right-to-left optical centre offset of a stereo pair.
    ///
    /// Always identity here; `stereo_offset_from_projection` can derive the
    /// baseline from the projection matrix when stereo input is supported.
    pub stereo_offset: RigidTransform,
}

/// Gate that accepts the first calibration message and ignores the rest.
///
/// Transitions only `Uninitialized -> Ready`.
#[derive(Clone, Debug, Default)]
pub enum CameraModelCache {
    #[default]
    Uninitialized,
    Ready(Calibration),
}

impl CameraModelCache {
    /// Handle a calibration message. Returns `true` if this message populated the cache.
    pub fn on_camera_info(&mut self, info: &CameraInfo, rectified: bool) -> bool {
        if self.is_ready() {
            log::debug!("camera already calibrated, ignoring further calibration messages");
            return false;
        }
        let camera = CameraModel::from_camera_info(info, rectified);
        if camera.is_valid() {
            log::info!(
                "camera calibration received: {}x{} fx={:.2} fy={:.2} cx={:.2} cy={:.2} (rectified: {})",
                camera.width,
                camera.height,
                camera.fx(),
                camera.fy(),
                camera.cx(),
                camera.cy(),
                rectified
            );
        } else {
            log::warn!(
                "camera calibration received but the model is not valid for pose estimation"
            );
        }
        *self = CameraModelCache::Ready(Calibration {
            camera,
            stereo_offset: RigidTransform::identity(),
        });
        true
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, CameraModelCache::Ready(_))
    }

    pub fn get(&self) -> Option<&Calibration> {
        match self {
            CameraModelCache::Ready(calibration) => Some(calibration),
            CameraModelCache::Uninitialized => None,
        }
    }
}
