//! Core types for republishing fiducial marker poses.
//!
//! This crate holds the data side of the pipeline and nothing that talks to
//! a detector: message stamps and headers, rigid-transform helpers, the
//! camera model, and the shared transform store.

mod camera;
mod geometry;
mod logger;
pub mod msgs;
mod store;
mod time;

pub use camera::{stereo_offset_from_projection, CameraModel};
pub use geometry::{interpolate, rigid_from_parts, RigidTransform, Rpy};
pub use store::{TransformBuffer, TransformError, TransformStore};
pub use time::{Time, TimeQuery};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env, LOG_ENV};
