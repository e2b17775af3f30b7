//! Startup configuration, frame naming and runtime reconfiguration.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

/// Marker search strategy understood by the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMode {
    /// Legacy exhaustive thresholding.
    #[serde(rename = "DM_NORMAL")]
    Normal,
    /// Single-scale fast search.
    #[default]
    #[serde(rename = "DM_FAST")]
    Fast,
    /// Fast search that reuses the previous frame's scale estimate.
    #[serde(rename = "DM_VIDEO_FAST")]
    VideoFast,
}

impl DetectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMode::Normal => "DM_NORMAL",
            DetectionMode::Fast => "DM_FAST",
            DetectionMode::VideoFast => "DM_VIDEO_FAST",
        }
    }
}

impl TryFrom<i32> for DetectionMode {
    type Error = ReconfigureError;

    /// Numeric codes of the reconfiguration channel.
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DetectionMode::Normal),
            1 => Ok(DetectionMode::Fast),
            2 => Ok(DetectionMode::VideoFast),
            other => Err(ReconfigureError::UnknownDetectionMode(other)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("camera_frame must be set")]
    MissingCameraFrame,
    #[error("marker_frame must be set")]
    MissingMarkerFrame,
    #[error("marker_size must be positive and finite (got {0})")]
    InvalidMarkerSize(f64),
    #[error("min_marker_size must be a fraction in [0, 1] (got {0})")]
    InvalidMinMarkerSize(f32),
    #[error("{name} must be non-negative and finite (got {value})")]
    InvalidTiming { name: &'static str, value: f64 },
    #[error("transform_poll_s must be positive and at most transform_timeout_s (got {poll}, timeout {timeout})")]
    InvalidPollInterval { poll: f64, timeout: f64 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReconfigureError {
    #[error("unknown detection mode code {0}")]
    UnknownDetectionMode(i32),
    #[error("min_image_size must be a fraction in [0, 1] (got {0})")]
    InvalidMinImageSize(f32),
}

/// Marker size limits are fractions of the image area.
fn is_area_fraction(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}

fn default_marker_size() -> f64 {
    0.05
}

fn default_marker_id() -> i32 {
    300
}

fn default_true() -> bool {
    true
}

fn default_min_marker_size() -> f32 {
    0.02
}

fn default_transform_timeout_s() -> f64 {
    0.5
}

fn default_transform_poll_s() -> f64 {
    0.01
}

/// Node parameters as read from disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Physical side length of the markers, in meters.
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
    /// Marker id announced at startup; every detected marker is processed.
    #[serde(default = "default_marker_id")]
    pub marker_id: i32,
    /// Frame the poses are expressed in; empty means the camera frame.
    #[serde(default)]
    pub reference_frame: String,
    #[serde(default)]
    pub camera_frame: String,
    /// Base name of the per-marker child frames.
    #[serde(default)]
    pub marker_frame: String,
    #[serde(default = "default_true")]
    pub image_is_rectified: bool,
    #[serde(default)]
    pub tf_prefix: String,
    /// Smallest marker the detector looks for, as a fraction of the image area.
    #[serde(default = "default_min_marker_size")]
    pub min_marker_size: f32,
    #[serde(default)]
    pub detection_mode: DetectionMode,
    #[serde(default = "default_transform_timeout_s")]
    pub transform_timeout_s: f64,
    #[serde(default = "default_transform_poll_s")]
    pub transform_poll_s: f64,
    /// Removed option, only accepted so old files still load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_refinement: Option<serde_json::Value>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            marker_size: default_marker_size(),
            marker_id: default_marker_id(),
            reference_frame: String::new(),
            camera_frame: String::new(),
            marker_frame: String::new(),
            image_is_rectified: true,
            tf_prefix: String::new(),
            min_marker_size: default_min_marker_size(),
            detection_mode: DetectionMode::default(),
            transform_timeout_s: default_transform_timeout_s(),
            transform_poll_s: default_transform_poll_s(),
            corner_refinement: None,
        }
    }
}

impl NodeConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the parameters and resolve frame names.
    pub fn validate(&self) -> Result<NodeSettings, ConfigError> {
        if self.camera_frame.is_empty() {
            return Err(ConfigError::MissingCameraFrame);
        }
        if self.marker_frame.is_empty() {
            return Err(ConfigError::MissingMarkerFrame);
        }
        if !(self.marker_size.is_finite() && self.marker_size > 0.0) {
            return Err(ConfigError::InvalidMarkerSize(self.marker_size));
        }
        if !is_area_fraction(self.min_marker_size) {
            return Err(ConfigError::InvalidMinMarkerSize(self.min_marker_size));
        }
        let transform_timeout = seconds("transform_timeout_s", self.transform_timeout_s)?;
        let transform_poll = seconds("transform_poll_s", self.transform_poll_s)?;
        if transform_poll.is_zero() || transform_poll > transform_timeout {
            return Err(ConfigError::InvalidPollInterval {
                poll: self.transform_poll_s,
                timeout: self.transform_timeout_s,
            });
        }

        if self.corner_refinement.is_some() {
            log::warn!(
                "corner_refinement is no longer supported by the detector and is ignored"
            );
        }

        Ok(NodeSettings {
            frames: FrameNames::new(
                &self.tf_prefix,
                &self.camera_frame,
                &self.reference_frame,
                &self.marker_frame,
            ),
            marker_size: self.marker_size,
            marker_id: self.marker_id,
            image_is_rectified: self.image_is_rectified,
            min_marker_size: self.min_marker_size,
            detection_mode: self.detection_mode,
            transform_timeout,
            transform_poll,
        })
    }
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidTiming { name, value })
}

/// Coordinate-frame names, fixed at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNames {
    /// Prefix shared by every frame this node names.
    pub prefix: String,
    pub camera: String,
    pub reference: String,
    /// Base name of the per-marker frames (without prefix).
    pub marker_base: String,
}

impl FrameNames {
    /// Apply `prefix` to the camera and reference frames; an empty reference
    /// falls back to the camera frame.
    pub fn new(prefix: &str, camera: &str, reference: &str, marker_base: &str) -> Self {
        let camera = format!("{prefix}{camera}");
        let reference = if reference.is_empty() {
            camera.clone()
        } else {
            format!("{prefix}{reference}")
        };
        Self {
            prefix: prefix.to_string(),
            camera,
            reference,
            marker_base: marker_base.to_string(),
        }
    }

    /// Poses are already in the reference frame, no lookup needed.
    pub fn reference_is_camera(&self) -> bool {
        self.reference == self.camera
    }

    /// Child frame of the marker with `id`: `{prefix}{marker_base}_{id}`.
    pub fn marker_frame(&self, id: i32) -> String {
        format!("{}{}_{}", self.prefix, self.marker_base, id)
    }
}

/// Validated, immutable node settings.
#[derive(Clone, Debug)]
pub struct NodeSettings {
    pub frames: FrameNames,
    pub marker_size: f64,
    pub marker_id: i32,
    pub image_is_rectified: bool,
    pub min_marker_size: f32,
    pub detection_mode: DetectionMode,
    pub transform_timeout: Duration,
    pub transform_poll: Duration,
}

/// Detector settings pushed at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconfigureUpdate {
    pub detection_mode: DetectionMode,
    pub min_image_size: f32,
    /// Illumination normalization; not implemented, only warned about.
    #[serde(default)]
    pub normalize_image: bool,
}

impl ReconfigureUpdate {
    /// Build an update from the numeric mode code used on the wire.
    pub fn from_code(
        mode: i32,
        min_image_size: f32,
        normalize_image: bool,
    ) -> Result<Self, ReconfigureError> {
        let update = Self {
            detection_mode: DetectionMode::try_from(mode)?,
            min_image_size,
            normalize_image,
        };
        update.validate()?;
        Ok(update)
    }

    pub fn validate(&self) -> Result<(), ReconfigureError> {
        if !is_area_fraction(self.min_image_size) {
            return Err(ReconfigureError::InvalidMinImageSize(self.min_image_size));
        }
        Ok(())
    }
}
