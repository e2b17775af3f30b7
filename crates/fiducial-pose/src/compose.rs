//! Reference-frame composition of corrected marker poses.

use fiducial_pose_core::{RigidTransform, Time, TimeQuery, TransformStore};
use nalgebra::Point2;

use crate::config::FrameNames;
use crate::correction::correct_orientation;
use crate::detector::MarkerDetection;
use crate::resolver::{FrameResolver, ResolveError};

/// Everything the fan-out needs for one marker of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedResult {
    pub stamp: Time,
    pub reference_frame: String,
    pub marker_frame: String,
    /// Maps marker coordinates into the reference frame.
    pub transform: RigidTransform,
    pub marker_id: i32,
    pub center_pixel: Point2<f32>,
}

/// `reference_from_camera * stereo_offset * marker_pose`.
pub fn compose(
    reference_from_camera: &RigidTransform,
    stereo_offset: &RigidTransform,
    marker_pose: &RigidTransform,
) -> RigidTransform {
    reference_from_camera * stereo_offset * marker_pose
}

/// Builds [`ComposedResult`]s from raw detections.
#[derive(Clone, Debug)]
pub struct TransformComposer {
    frames: FrameNames,
    resolver: FrameResolver,
}

/// A composed marker plus the resolver failure it was degraded by, if any.
#[derive(Clone, Debug)]
pub struct Composition {
    pub result: ComposedResult,
    pub degraded: Option<ResolveError>,
}

impl TransformComposer {
    pub fn new(frames: FrameNames, resolver: FrameResolver) -> Self {
        Self { frames, resolver }
    }

    pub fn frames(&self) -> &FrameNames {
        &self.frames
    }

    /// Reference-from-camera transform, or identity when the frames coincide.
    ///
    /// The wait targets the newest transform in the store rather than the
    /// image stamp, so a frame tree lagging behind the camera still resolves.
    /// A resolver failure degrades to identity; the error is handed back so
    /// the caller can count it.
    pub fn reference_from_camera<S: TransformStore + ?Sized>(
        &self,
        store: &S,
    ) -> (RigidTransform, Option<ResolveError>) {
        if self.frames.reference_is_camera() {
            return (RigidTransform::identity(), None);
        }
        match self.resolver.resolve(
            store,
            &self.frames.reference,
            &self.frames.camera,
            TimeQuery::Latest,
        ) {
            Ok(tf) => (tf, None),
            Err(err) => (RigidTransform::identity(), Some(err)),
        }
    }

    /// Correct, resolve and compose one detection.
    pub fn compose_marker<S: TransformStore + ?Sized>(
        &self,
        store: &S,
        stamp: Time,
        stereo_offset: &RigidTransform,
        detection: &MarkerDetection,
    ) -> Composition {
        let corrected = correct_orientation(&detection.pose);
        let (reference_from_camera, degraded) = self.reference_from_camera(store);
        Composition {
            result: ComposedResult {
                stamp,
                reference_frame: self.frames.reference.clone(),
                marker_frame: self.frames.marker_frame(detection.id),
                transform: compose(&reference_from_camera, stereo_offset, &corrected),
                marker_id: detection.id,
                center_pixel: detection.center(),
            },
            degraded,
        }
    }
}
