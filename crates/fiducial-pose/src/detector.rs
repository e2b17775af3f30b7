use std::collections::VecDeque;

use fiducial_pose_core::{CameraModel, RigidTransform};
use image::RgbImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::config::DetectionMode;

/// One marker found in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: i32,
    /// Image-space corners, in detector order.
    pub corners: [Point2<f32>; 4],
    /// Marker pose relative to the camera optical frame.
    pub pose: RigidTransform,
}

impl MarkerDetection {
    /// Mean of the four corners, in pixels.
    pub fn center(&self) -> Point2<f32> {
        let sum = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, c| acc + c.coords);
        Point2::from(sum / 4.0)
    }
}

/// Marker detector driven by the node.
pub trait MarkerDetector {
    fn set_detection_mode(&mut self, mode: DetectionMode, min_marker_size: f32);

    /// Detect markers of physical side `marker_size` and estimate their poses.
    fn detect(
        &mut self,
        image: &RgbImage,
        camera: &CameraModel,
        marker_size: f64,
    ) -> Vec<MarkerDetection>;
}

/// Detector that replays pre-recorded detections, one batch per frame.
#[derive(Clone, Debug, Default)]
pub struct RecordedDetector {
    frames: VecDeque<Vec<MarkerDetection>>,
    mode: DetectionMode,
    min_marker_size: f32,
}

impl RecordedDetector {
    pub fn new(frames: impl IntoIterator<Item = Vec<MarkerDetection>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queue detections for the next frame that is not yet covered.
    pub fn push_frame(&mut self, detections: Vec<MarkerDetection>) {
        self.frames.push_back(detections);
    }

    /// Drop every queued batch.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn mode(&self) -> (DetectionMode, f32) {
        (self.mode, self.min_marker_size)
    }
}

impl MarkerDetector for RecordedDetector {
    fn set_detection_mode(&mut self, mode: DetectionMode, min_marker_size: f32) {
        self.mode = mode;
        self.min_marker_size = min_marker_size;
    }

    fn detect(
        &mut self,
        _image: &RgbImage,
        _camera: &CameraModel,
        _marker_size: f64,
    ) -> Vec<MarkerDetection> {
        self.frames.pop_front().unwrap_or_default()
    }
}
