//! Recorded sessions and their replay through the node.

use std::{fs, path::Path, sync::Arc};

use fiducial_pose_core::msgs::{CameraInfo, ImageMessage, Pose, TransformStamped};
use fiducial_pose_core::{rigid_from_parts, Time, TransformBuffer, TransformStore};
use nalgebra::{Point2, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, NodeConfig, ReconfigureUpdate};
use crate::detector::{MarkerDetection, RecordedDetector};
use crate::fanout::{Published, RecordingSink};
use crate::node::{FrameOutcome, MarkerPoseNode};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A marker as written by the recorder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordedMarker {
    pub id: i32,
    pub corners: [[f32; 2]; 4],
    /// Camera-relative pose.
    pub pose: Pose,
}

impl From<&RecordedMarker> for MarkerDetection {
    fn from(m: &RecordedMarker) -> Self {
        let p = m.pose.position;
        let q = m.pose.orientation;
        MarkerDetection {
            id: m.id,
            corners: m.corners.map(|[x, y]| Point2::new(x, y)),
            pose: rigid_from_parts(
                Vector3::new(p.x, p.y, p.z),
                UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
            ),
        }
    }
}

/// Everything that happened before and at one image, in delivery order:
/// transforms, calibration, reconfiguration, then the image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionFrame {
    #[serde(default)]
    pub transforms: Vec<TransformStamped>,
    #[serde(default)]
    pub camera_info: Option<CameraInfo>,
    #[serde(default)]
    pub reconfigure: Option<ReconfigureUpdate>,
    pub image: ImageMessage,
    #[serde(default)]
    pub markers: Vec<RecordedMarker>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    /// Transforms loaded into the store before the first frame.
    #[serde(default)]
    pub static_transforms: Vec<TransformStamped>,
    pub frames: Vec<SessionFrame>,
}

impl Session {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameRecord {
    pub stamp: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FrameOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReplayReport {
    pub frames: Vec<FrameRecord>,
    pub messages: Vec<Published>,
}

impl ReplayReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Drive a fresh node through `session` and collect everything it published.
pub fn replay(config: &NodeConfig, session: &Session) -> Result<ReplayReport, SessionError> {
    let store = Arc::new(TransformBuffer::default());
    for tf in &session.static_transforms {
        store.publish(tf);
    }
    let detector = RecordedDetector::default();
    let mut node = MarkerPoseNode::new(config, detector, Arc::clone(&store))?;
    let mut sink = RecordingSink::default();
    let mut report = ReplayReport::default();

    for frame in &session.frames {
        for tf in &frame.transforms {
            store.publish(tf);
        }
        if let Some(info) = &frame.camera_info {
            node.on_camera_info(info);
        }
        if let Some(update) = &frame.reconfigure {
            // Rejections are logged by the node; the frame still runs.
            let _ = node.on_reconfigure(update);
        }
        let stamp = frame.image.header.stamp;
        // Detections are queued only for frames the node will run the detector on.
        if node.is_calibrated() {
            node.detector_mut()
                .push_frame(frame.markers.iter().map(MarkerDetection::from).collect());
        }
        let record = match node.on_image(&frame.image, &mut sink) {
            Ok(outcome) => FrameRecord {
                stamp,
                outcome: Some(outcome),
                error: None,
            },
            Err(err) => {
                // Undecodable frames never reach the detector; drop their batch.
                if node.is_calibrated() {
                    node.detector_mut().clear();
                }
                FrameRecord {
                    stamp,
                    outcome: None,
                    error: Some(err.to_string()),
                }
            }
        };
        report.frames.push(record);
    }
    report.messages = sink.take();
    Ok(report)
}
