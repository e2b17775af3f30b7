use std::f64::consts::PI;

use approx::assert_relative_eq;
use fiducial_pose::core::msgs::{CameraInfo, Header, ImageMessage, TransformStamped};
use fiducial_pose::core::{rigid_from_parts, Rpy, Time, TimeQuery};
use fiducial_pose::{
    DetectionMode, FrameError, FrameOutcome, FrameReport, MarkerDetection, MarkerPoseNode,
    NodeConfig, Published, RecordedDetector, RecordingSink, ReconfigureError, ReconfigureUpdate,
    TransformBuffer, TransformStore,
};
use nalgebra::{Point2, UnitQuaternion, Vector3};

fn config(reference: &str) -> NodeConfig {
    NodeConfig {
        marker_size: 0.10,
        camera_frame: "camera".to_string(),
        reference_frame: reference.to_string(),
        marker_frame: "marker".to_string(),
        transform_timeout_s: 0.02,
        transform_poll_s: 0.005,
        ..NodeConfig::default()
    }
}

fn camera_info() -> CameraInfo {
    CameraInfo {
        header: Header::new(Time::new(1, 0), "camera"),
        width: 4,
        height: 2,
        distortion_model: "plumb_bob".to_string(),
        d: vec![0.0; 5],
        k: [500.0, 0.0, 2.0, 0.0, 500.0, 1.0, 0.0, 0.0, 1.0],
        r: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        p: [500.0, 0.0, 2.0, 0.0, 0.0, 500.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    }
}

fn image(sec: u32) -> ImageMessage {
    ImageMessage {
        header: Header::new(Time::new(sec, 250), "camera"),
        height: 2,
        width: 4,
        encoding: "rgb8".to_string(),
        is_bigendian: false,
        step: 12,
        data: vec![128; 24],
    }
}

/// Detection whose swapped-axis angles are `(roll, pitch, yaw)`.
fn marker(id: i32, roll: f64, pitch: f64, yaw: f64) -> MarkerDetection {
    MarkerDetection {
        id,
        corners: [
            Point2::new(100.0, 50.0),
            Point2::new(140.0, 50.0),
            Point2::new(140.0, 90.0),
            Point2::new(100.0, 90.0),
        ],
        pose: rigid_from_parts(
            Vector3::new(0.05, -0.02, 0.9),
            Rpy::new(pitch, yaw, roll).to_rotation(),
        ),
    }
}

fn node(
    reference: &str,
    frames: Vec<Vec<MarkerDetection>>,
) -> MarkerPoseNode<RecordedDetector, TransformBuffer> {
    MarkerPoseNode::new(
        &config(reference),
        RecordedDetector::new(frames),
        TransformBuffer::default(),
    )
    .expect("valid config")
}

#[test]
fn frames_before_calibration_publish_nothing() {
    let mut node = node("", vec![vec![marker(3, 0.2, -0.1, 0.5)]; 5]);
    let mut sink = RecordingSink::with_image_subscribers(1);
    for sec in 0..5 {
        let outcome = node.on_image(&image(sec), &mut sink).expect("no error");
        assert_eq!(outcome, FrameOutcome::CameraNotReady);
    }
    assert!(sink.messages.is_empty());
    assert!(node.store().frames().is_empty());
}

#[test]
fn undecodable_frames_before_calibration_are_still_skipped() {
    let mut node = node("", vec![]);
    let mut sink = RecordingSink::default();
    let mut bad = image(1);
    bad.encoding = "yuv422".to_string();
    assert_eq!(
        node.on_image(&bad, &mut sink).expect("gated"),
        FrameOutcome::CameraNotReady
    );
}

#[test]
fn single_marker_is_corrected_and_fanned_out() {
    let mut node = node("", vec![vec![marker(3, 0.2, -0.1, 0.5)]]);
    node.on_camera_info(&camera_info());
    let mut sink = RecordingSink::default();

    let outcome = node.on_image(&image(10), &mut sink).expect("processed");
    assert_eq!(
        outcome,
        FrameOutcome::Processed(FrameReport {
            markers: 1,
            degraded: 0
        })
    );
    assert_eq!(sink.messages.len(), 5);

    let header = Header::new(Time::new(10, 250), "camera");
    assert!(sink.messages.iter().all(|m| *m.header() == header));

    let transform = sink
        .messages
        .iter()
        .find_map(|m| match m {
            Published::Transform(t) => Some(t.clone()),
            _ => None,
        })
        .expect("transform published");
    assert_eq!(transform.child_frame_id, "marker_3");

    let expected = Rpy::new(PI, 0.5, 0.0).to_rotation();
    assert!(transform.rigid().rotation.angle_to(&expected) < 1e-3);
    assert_relative_eq!(
        transform.rigid().translation.vector,
        Vector3::new(0.05, -0.02, 0.9),
        epsilon = 1e-12
    );

    let pixel = sink
        .messages
        .iter()
        .find_map(|m| match m {
            Published::Pixel(p) => Some(p.point),
            _ => None,
        })
        .expect("pixel published");
    assert_eq!((pixel.x, pixel.y, pixel.z), (120.0, 70.0, 0.0));

    let visual = sink
        .messages
        .iter()
        .find_map(|m| match m {
            Published::Visual(v) => Some(v.clone()),
            _ => None,
        })
        .expect("visual published");
    assert_eq!(visual.scale.x, 0.10);
    assert_eq!(visual.scale.y, 0.10);
}

#[test]
fn every_marker_gets_its_own_outputs_and_frame() {
    let mut node = node(
        "",
        vec![vec![marker(1, 0.0, 0.0, 0.1), marker(7, 0.0, 0.0, -0.2)]],
    );
    node.on_camera_info(&camera_info());
    let mut sink = RecordingSink::default();
    node.on_image(&image(3), &mut sink).expect("processed");

    assert_eq!(sink.messages.len(), 10);
    let children: Vec<_> = sink
        .messages
        .iter()
        .filter_map(|m| match m {
            Published::Transform(t) => Some(t.child_frame_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(children, vec!["marker_1", "marker_7"]);

    // Broadcast transforms are readable from the shared store.
    for child in ["marker_1", "marker_7"] {
        assert!(node
            .store()
            .lookup("camera", child, TimeQuery::At(Time::new(3, 250)))
            .is_ok());
    }
}

#[test]
fn unavailable_reference_degrades_every_time() {
    let mut node = node(
        "map",
        vec![
            vec![marker(2, 0.1, 0.1, 0.3)],
            vec![marker(2, 0.1, 0.1, 0.3), marker(4, 0.0, 0.0, 0.0)],
        ],
    );
    node.on_camera_info(&camera_info());
    let mut sink = RecordingSink::default();

    let first = node.on_image(&image(1), &mut sink).expect("processed");
    let second = node.on_image(&image(2), &mut sink).expect("processed");
    assert_eq!(first, FrameOutcome::Processed(FrameReport { markers: 1, degraded: 1 }));
    assert_eq!(second, FrameOutcome::Processed(FrameReport { markers: 2, degraded: 2 }));
    assert_eq!(sink.messages.len(), 15);

    let transform = sink
        .messages
        .iter()
        .find_map(|m| match m {
            Published::Transform(t) => Some(t.clone()),
            _ => None,
        })
        .expect("transform published");
    assert_eq!(transform.header.frame_id, "map");
    assert_relative_eq!(
        transform.rigid().translation.vector,
        Vector3::new(0.05, -0.02, 0.9),
        epsilon = 1e-12
    );
}

#[test]
fn reference_transform_is_resolved_from_the_store() {
    let mut node = node("map", vec![vec![marker(5, 0.0, 0.0, 0.0)]]);
    let map_from_camera = rigid_from_parts(Vector3::new(1.0, 2.0, 3.0), UnitQuaternion::identity());
    node.store().publish(&TransformStamped::new(
        Time::new(4, 0),
        "map",
        "camera",
        &map_from_camera,
    ));
    node.on_camera_info(&camera_info());
    let mut sink = RecordingSink::default();

    // Image stamp is newer than the store sample; the latest sample is used.
    let outcome = node.on_image(&image(4), &mut sink).expect("processed");
    assert_eq!(outcome, FrameOutcome::Processed(FrameReport { markers: 1, degraded: 0 }));

    let tf = node
        .store()
        .lookup("map", "marker_5", TimeQuery::Latest)
        .expect("marker broadcast");
    assert_relative_eq!(tf.translation.vector, Vector3::new(1.05, 1.98, 3.9), epsilon = 1e-12);
}

#[test]
fn decode_error_abandons_only_that_frame() {
    let mut node = node("", vec![vec![marker(3, 0.0, 0.0, 0.0)]]);
    node.on_camera_info(&camera_info());
    let mut sink = RecordingSink::default();

    let mut bad = image(1);
    bad.data.truncate(5);
    assert!(matches!(
        node.on_image(&bad, &mut sink),
        Err(FrameError::Decode(_))
    ));
    assert!(sink.messages.is_empty());

    let outcome = node.on_image(&image(2), &mut sink).expect("recovered");
    assert_eq!(outcome, FrameOutcome::Processed(FrameReport { markers: 1, degraded: 0 }));
    assert_eq!(sink.messages.len(), 5);
}

#[test]
fn result_image_only_with_subscribers() {
    let mut node = node("", vec![vec![], vec![]]);
    node.on_camera_info(&camera_info());

    let mut quiet = RecordingSink::default();
    node.on_image(&image(1), &mut quiet).expect("processed");
    assert!(quiet.messages.is_empty());

    let mut watched = RecordingSink::with_image_subscribers(2);
    node.on_image(&image(2), &mut watched).expect("processed");
    match watched.messages.as_slice() {
        [Published::Image(img)] => {
            assert_eq!(img.encoding, "rgb8");
            assert_eq!(img.header.stamp, Time::new(2, 250));
            assert_eq!(img.data.len(), 24);
        }
        other => panic!("unexpected messages: {other:?}"),
    }
}

#[test]
fn later_calibration_messages_are_ignored() {
    let mut node = node("", vec![]);
    node.on_camera_info(&camera_info());
    let mut other = camera_info();
    other.p[0] = 0.0;
    node.on_camera_info(&other);
    assert!(node.is_calibrated());
}

#[test]
fn reconfigure_reaches_the_detector() {
    let mut node = node("", vec![]);
    assert_eq!(node.detector().mode(), (DetectionMode::Fast, 0.02));

    node.on_reconfigure(&ReconfigureUpdate {
        detection_mode: DetectionMode::Normal,
        min_image_size: 0.1,
        normalize_image: false,
    })
    .expect("accepted");
    assert_eq!(node.detector().mode(), (DetectionMode::Normal, 0.1));

    // Normalization is not supported; the rest of the update still applies.
    node.on_reconfigure(&ReconfigureUpdate {
        detection_mode: DetectionMode::VideoFast,
        min_image_size: 0.05,
        normalize_image: true,
    })
    .expect("accepted");
    assert_eq!(node.detector().mode(), (DetectionMode::VideoFast, 0.05));
}

#[test]
fn normalize_request_does_not_stop_processing() {
    let mut node = node("", vec![vec![marker(2, 0.0, 0.0, 0.3)]]);
    node.on_camera_info(&camera_info());
    node.on_reconfigure(&ReconfigureUpdate {
        detection_mode: DetectionMode::Fast,
        min_image_size: 0.02,
        normalize_image: true,
    })
    .expect("accepted");

    let mut sink = RecordingSink::default();
    let outcome = node.on_image(&image(3), &mut sink).expect("processed");
    assert_eq!(
        outcome,
        FrameOutcome::Processed(FrameReport {
            markers: 1,
            degraded: 0
        })
    );
    assert_eq!(sink.messages.len(), 5);
}

#[test]
fn out_of_range_reconfigure_keeps_previous_mode() {
    let mut node = node("", vec![]);
    let err = node
        .on_reconfigure(&ReconfigureUpdate {
            detection_mode: DetectionMode::Normal,
            min_image_size: 2.0,
            normalize_image: false,
        })
        .expect_err("rejected");
    assert_eq!(err, ReconfigureError::InvalidMinImageSize(2.0));
    assert_eq!(node.detector().mode(), (DetectionMode::Fast, 0.02));
}

#[test]
fn missing_marker_frame_refuses_to_start() {
    let cfg = NodeConfig {
        marker_frame: String::new(),
        ..config("")
    };
    let detector = RecordedDetector::default();
    assert!(MarkerPoseNode::new(&cfg, detector, TransformBuffer::default()).is_err());
}

#[test]
fn stereo_offset_stays_identity() {
    let mut node = node("", vec![vec![marker(9, 0.0, 0.0, 0.0)]]);
    let mut info = camera_info();
    info.p[3] = -30.0;
    node.on_camera_info(&info);
    let mut sink = RecordingSink::default();
    node.on_image(&image(1), &mut sink).expect("processed");
    let tf = node
        .store()
        .lookup("camera", "marker_9", TimeQuery::Latest)
        .expect("broadcast");
    assert_relative_eq!(tf.translation.vector, Vector3::new(0.05, -0.02, 0.9), epsilon = 1e-12);
}
