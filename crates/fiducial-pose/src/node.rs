//! Callback-driven marker pose node.
//!
//! Three callbacks feed the node: calibration, images and detector
//! reconfiguration. They are expected on one thread, one at a time; frames
//! are handled strictly in arrival order.

use fiducial_pose_core::msgs::{CameraInfo, Header, ImageMessage};
use fiducial_pose_core::TransformStore;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::calibration::CameraModelCache;
use crate::compose::TransformComposer;
use crate::config::{
    ConfigError, NodeConfig, NodeSettings, ReconfigureError, ReconfigureUpdate,
};
use crate::decode::{decode_rgb8, encode_rgb8, ImageDecodeError};
use crate::detector::MarkerDetector;
use crate::fanout::{MarkerOutputs, MarkerSink};
use crate::resolver::FrameResolver;

/// Frame-fatal errors; the frame publishes nothing.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Decode(#[from] ImageDecodeError),
}

/// Per-frame summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Markers published.
    pub markers: usize,
    /// Markers whose reference transform fell back to identity.
    pub degraded: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Calibration has not arrived yet; the frame was skipped.
    CameraNotReady,
    Processed(FrameReport),
}

/// Marker pose node over a detector `D` and a transform store `S`.
pub struct MarkerPoseNode<D, S> {
    settings: NodeSettings,
    detector: D,
    store: S,
    composer: TransformComposer,
    camera: CameraModelCache,
}

impl<D: MarkerDetector, S: TransformStore> MarkerPoseNode<D, S> {
    /// Validate `config` and set up the node. Missing frame names are fatal.
    pub fn new(config: &NodeConfig, detector: D, store: S) -> Result<Self, ConfigError> {
        Ok(Self::from_settings(config.validate()?, detector, store))
    }

    pub fn from_settings(settings: NodeSettings, mut detector: D, store: S) -> Self {
        detector.set_detection_mode(settings.detection_mode, settings.min_marker_size);
        log::info!(
            "detection mode: {}, min marker size: {}% of image area",
            settings.detection_mode.as_str(),
            settings.min_marker_size * 100.0
        );
        log::info!(
            "marker size {} m, announced marker id {}",
            settings.marker_size,
            settings.marker_id
        );
        log::info!(
            "publishing marker poses with \"{}\" as parent and \"{}\" as child",
            settings.frames.reference,
            settings.frames.marker_frame(settings.marker_id)
        );
        let resolver = FrameResolver::new(settings.transform_timeout, settings.transform_poll);
        let composer = TransformComposer::new(settings.frames.clone(), resolver);
        Self {
            settings,
            detector,
            store,
            composer,
            camera: CameraModelCache::default(),
        }
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_calibrated(&self) -> bool {
        self.camera.is_ready()
    }

    /// Calibration callback; only the first message has an effect.
    pub fn on_camera_info(&mut self, info: &CameraInfo) {
        self.camera
            .on_camera_info(info, self.settings.image_is_rectified);
    }

    /// Detector reconfiguration callback.
    ///
    /// An out-of-range update is rejected and the detector keeps its mode.
    pub fn on_reconfigure(&mut self, update: &ReconfigureUpdate) -> Result<(), ReconfigureError> {
        if let Err(err) = update.validate() {
            log::warn!("rejected detector reconfiguration: {}", err);
            return Err(err);
        }
        self.detector
            .set_detection_mode(update.detection_mode, update.min_image_size);
        log::info!(
            "detection mode set to {} (min image size {})",
            update.detection_mode.as_str(),
            update.min_image_size
        );
        if update.normalize_image {
            log::warn!("normalize_image is unimplemented");
        }
        Ok(())
    }

    /// Image callback: detect, correct, compose and publish every marker.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, msg, sink),
            fields(sec = msg.header.stamp.sec, nsec = msg.header.stamp.nsec)
        )
    )]
    pub fn on_image<K: MarkerSink + ?Sized>(
        &mut self,
        msg: &ImageMessage,
        sink: &mut K,
    ) -> Result<FrameOutcome, FrameError> {
        let Some(calibration) = self.camera.get() else {
            return Ok(FrameOutcome::CameraNotReady);
        };
        let stamp = msg.header.stamp;
        let image = decode_rgb8(msg).map_err(|err| {
            log::error!("failed to decode image at {:.3}s: {}", stamp.as_secs_f64(), err);
            err
        })?;

        let detections = self
            .detector
            .detect(&image, &calibration.camera, self.settings.marker_size);

        let mut report = FrameReport::default();
        for detection in &detections {
            let composed = self.composer.compose_marker(
                &self.store,
                stamp,
                &calibration.stereo_offset,
                detection,
            );
            if composed.degraded.is_some() {
                report.degraded += 1;
            }
            MarkerOutputs::build(&composed.result, self.settings.marker_size)
                .emit(&self.store, sink);
            report.markers += 1;
        }

        if sink.image_subscribers() > 0 {
            sink.publish_image(&encode_rgb8(&image, Header::new(stamp, "")));
        }
        Ok(FrameOutcome::Processed(report))
    }
}
