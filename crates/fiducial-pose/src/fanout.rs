//! Fan-out of one composed marker into every published representation.

use std::time::Duration;

use fiducial_pose_core::msgs::{
    ColorRgba, Header, ImageMessage, MarkerAction, MarkerShape, Point, PointStamped, Pose,
    PoseStamped, TransformStamped, Vector3, Vector3Stamped, VisualMarker,
};
use fiducial_pose_core::TransformStore;
use serde::{Deserialize, Serialize};

use crate::compose::ComposedResult;

/// Thickness of the viewer cube, in meters.
pub const VISUAL_THICKNESS: f64 = 0.001;
/// How long a viewer keeps a marker cube without refresh.
pub const VISUAL_LIFETIME: Duration = Duration::from_secs(3);
pub const VISUAL_COLOR: ColorRgba = ColorRgba {
    r: 1.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// Output channels of the node.
pub trait MarkerSink {
    fn publish_transform(&mut self, msg: &TransformStamped);
    fn publish_pose(&mut self, msg: &PoseStamped);
    fn publish_position(&mut self, msg: &Vector3Stamped);
    fn publish_pixel(&mut self, msg: &PointStamped);
    fn publish_visual(&mut self, msg: &VisualMarker);

    /// Number of consumers attached to the image channel.
    fn image_subscribers(&self) -> usize {
        0
    }

    fn publish_image(&mut self, _msg: &ImageMessage) {}
}

/// The five messages derived from one marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerOutputs {
    pub transform: TransformStamped,
    pub pose: PoseStamped,
    pub position: Vector3Stamped,
    pub pixel: PointStamped,
    pub visual: VisualMarker,
}

impl MarkerOutputs {
    /// Derive every representation from one composed result.
    ///
    /// All five share one header; the pixel point is image-space but still
    /// carries the reference frame and frame stamp.
    pub fn build(result: &ComposedResult, marker_size: f64) -> Self {
        let transform = TransformStamped::new(
            result.stamp,
            result.reference_frame.clone(),
            result.marker_frame.clone(),
            &result.transform,
        );
        let header: Header = transform.header.clone();
        let pose = Pose::from(&result.transform);
        let t = transform.transform.translation;

        Self {
            pose: PoseStamped {
                header: header.clone(),
                pose,
            },
            position: Vector3Stamped {
                header: header.clone(),
                vector: t,
            },
            pixel: PointStamped {
                header: header.clone(),
                point: Point {
                    x: result.center_pixel.x as f64,
                    y: result.center_pixel.y as f64,
                    z: 0.0,
                },
            },
            visual: VisualMarker {
                header,
                ns: String::new(),
                id: 1,
                shape: MarkerShape::Cube,
                action: MarkerAction::Add,
                pose,
                scale: Vector3 {
                    x: marker_size,
                    y: marker_size,
                    z: VISUAL_THICKNESS,
                },
                color: VISUAL_COLOR,
                lifetime: VISUAL_LIFETIME,
            },
            transform,
        }
    }

    /// Broadcast the transform to the store, then publish every message.
    pub fn emit<S, K>(&self, store: &S, sink: &mut K)
    where
        S: TransformStore + ?Sized,
        K: MarkerSink + ?Sized,
    {
        store.publish(&self.transform);
        sink.publish_pose(&self.pose);
        sink.publish_transform(&self.transform);
        sink.publish_position(&self.position);
        sink.publish_pixel(&self.pixel);
        sink.publish_visual(&self.visual);
    }
}

/// One message as seen by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "msg", rename_all = "snake_case")]
pub enum Published {
    Transform(TransformStamped),
    Pose(PoseStamped),
    Position(Vector3Stamped),
    Pixel(PointStamped),
    Visual(VisualMarker),
    Image(ImageMessage),
}

impl Published {
    pub fn header(&self) -> &Header {
        match self {
            Published::Transform(m) => &m.header,
            Published::Pose(m) => &m.header,
            Published::Position(m) => &m.header,
            Published::Pixel(m) => &m.header,
            Published::Visual(m) => &m.header,
            Published::Image(m) => &m.header,
        }
    }
}

/// Sink that keeps every message in publish order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub messages: Vec<Published>,
    /// Reported image subscriber count.
    pub image_subscribers: usize,
}

impl RecordingSink {
    pub fn with_image_subscribers(count: usize) -> Self {
        Self {
            messages: Vec::new(),
            image_subscribers: count,
        }
    }

    pub fn take(&mut self) -> Vec<Published> {
        std::mem::take(&mut self.messages)
    }
}

impl MarkerSink for RecordingSink {
    fn publish_transform(&mut self, msg: &TransformStamped) {
        self.messages.push(Published::Transform(msg.clone()));
    }

    fn publish_pose(&mut self, msg: &PoseStamped) {
        self.messages.push(Published::Pose(msg.clone()));
    }

    fn publish_position(&mut self, msg: &Vector3Stamped) {
        self.messages.push(Published::Position(msg.clone()));
    }

    fn publish_pixel(&mut self, msg: &PointStamped) {
        self.messages.push(Published::Pixel(msg.clone()));
    }

    fn publish_visual(&mut self, msg: &VisualMarker) {
        self.messages.push(Published::Visual(msg.clone()));
    }

    fn image_subscribers(&self) -> usize {
        self.image_subscribers
    }

    fn publish_image(&mut self, msg: &ImageMessage) {
        self.messages.push(Published::Image(msg.clone()));
    }
}
