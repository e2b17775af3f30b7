//! Fiducial marker pose republishing.
//!
//! Per-frame marker detections (id, image corners, camera-relative pose) go
//! through a fixed pipeline:
//!
//! 1. the [`CameraModelCache`] gates everything until calibration arrives;
//! 2. [`correct_orientation`] replaces roll/pitch with a fixed flip and keeps yaw;
//! 3. the [`TransformComposer`] resolves the reference-from-camera transform
//!    through a [`TransformStore`] and composes
//!    `reference_from_camera * stereo_offset * marker_pose`;
//! 4. [`MarkerOutputs`] fans the result out as transform, pose, position,
//!    pixel and viewer cube, all under one header, and broadcasts the
//!    transform back to the store.
//!
//! [`MarkerPoseNode`] wires the callbacks together; [`session::replay`] runs
//! it over a recorded session.
//!
//! ## Quickstart
//!
//! ```no_run
//! use fiducial_pose::{MarkerPoseNode, NodeConfig, RecordedDetector, RecordingSink};
//! use fiducial_pose_core::TransformBuffer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig::load_json("node.json")?;
//! let detector = RecordedDetector::default();
//! let mut node = MarkerPoseNode::new(&config, detector, TransformBuffer::default())?;
//! let mut sink = RecordingSink::default();
//! # let image: fiducial_pose_core::msgs::ImageMessage = unimplemented!();
//! let outcome = node.on_image(&image, &mut sink)?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod calibration;
mod compose;
mod config;
mod correction;
mod decode;
mod detector;
mod fanout;
mod node;
mod resolver;
pub mod session;

pub use calibration::{Calibration, CameraModelCache};
pub use compose::{compose, ComposedResult, Composition, TransformComposer};
pub use config::{
    ConfigError, DetectionMode, FrameNames, NodeConfig, NodeSettings, ReconfigureError,
    ReconfigureUpdate,
};
pub use correction::{correct_orientation, SwappedRpy, FLIP_ROLL};
pub use decode::{decode_rgb8, encode_rgb8, ImageDecodeError};
pub use detector::{MarkerDetection, MarkerDetector, RecordedDetector};
pub use fanout::{
    MarkerOutputs, MarkerSink, Published, RecordingSink, VISUAL_COLOR, VISUAL_LIFETIME,
    VISUAL_THICKNESS,
};
pub use node::{FrameError, FrameOutcome, FrameReport, MarkerPoseNode};
pub use resolver::{FrameResolver, ResolveError};

pub use fiducial_pose_core as core;
pub use fiducial_pose_core::{TransformBuffer, TransformStore};
