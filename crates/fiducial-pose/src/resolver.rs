//! Bounded-wait lookup of the reference-from-camera transform.

use std::time::Duration;

use fiducial_pose_core::{RigidTransform, TimeQuery, TransformError, TransformStore};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("transform \"{child}\" -> \"{reference}\" not available: {detail}")]
    TransformUnavailable {
        reference: String,
        child: String,
        detail: TransformError,
    },
    #[error("lookup of \"{child}\" in \"{reference}\" failed")]
    TransformLookup {
        reference: String,
        child: String,
        #[source]
        source: TransformError,
    },
}

/// Waits for and reads transforms from a [`TransformStore`].
#[derive(Clone, Copy, Debug)]
pub struct FrameResolver {
    timeout: Duration,
    poll: Duration,
}

impl Default for FrameResolver {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(10))
    }
}

impl FrameResolver {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Transform mapping `child` coordinates into `reference`.
    ///
    /// Waits up to the configured timeout for the transform to become
    /// available at `at`, then reads the most recent one, which tolerates
    /// small stamp skew between the image and the frame tree. Failures are
    /// logged here and returned; nothing panics past the caller.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, store)))]
    pub fn resolve<S: TransformStore + ?Sized>(
        &self,
        store: &S,
        reference: &str,
        child: &str,
        at: TimeQuery,
    ) -> Result<RigidTransform, ResolveError> {
        if let Err(detail) = store.wait_for_transform(reference, child, at, self.timeout, self.poll)
        {
            log::error!(
                "unable to get \"{}\" in \"{}\" from the frame store: {}",
                child,
                reference,
                detail
            );
            return Err(ResolveError::TransformUnavailable {
                reference: reference.to_string(),
                child: child.to_string(),
                detail,
            });
        }
        store
            .lookup(reference, child, TimeQuery::Latest)
            .map_err(|source| {
                log::error!(
                    "error in lookup of \"{}\" in \"{}\": {}",
                    child,
                    reference,
                    source
                );
                ResolveError::TransformLookup {
                    reference: reference.to_string(),
                    child: child.to_string(),
                    source,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_pose_core::{msgs::TransformStamped, rigid_from_parts, Time, TransformBuffer};
    use nalgebra::{UnitQuaternion, Vector3};
    use std::cell::Cell;

    fn quick() -> FrameResolver {
        FrameResolver::new(Duration::from_millis(20), Duration::from_millis(2))
    }

    #[test]
    fn returns_latest_transform_when_available() {
        let store = TransformBuffer::default();
        for (s, x) in [(1, 1.0), (2, 2.0)] {
            let iso = rigid_from_parts(Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity());
            store.publish(&TransformStamped::new(Time::new(s, 0), "map", "cam", &iso));
        }
        // Requested at the first stamp, answered with the newest sample.
        let tf = quick()
            .resolve(&store, "map", "cam", TimeQuery::At(Time::new(1, 0)))
            .expect("resolved");
        assert_eq!(tf.translation.vector.x, 2.0);
    }

    #[test]
    fn times_out_when_nothing_is_published() {
        let store = TransformBuffer::default();
        let err = quick()
            .resolve(&store, "map", "cam", TimeQuery::Latest)
            .expect_err("unavailable");
        assert!(matches!(err, ResolveError::TransformUnavailable { .. }));
    }

    /// Reports the transform as available, then fails the actual lookup.
    struct FlakyStore {
        lookups: Cell<usize>,
    }

    impl TransformStore for FlakyStore {
        fn publish(&self, _transform: &TransformStamped) {}

        fn lookup(
            &self,
            _target: &str,
            _source: &str,
            _time: TimeQuery,
        ) -> Result<RigidTransform, TransformError> {
            self.lookups.set(self.lookups.get() + 1);
            Err(TransformError::Disconnected {
                target: "map".to_string(),
                source_frame: "cam".to_string(),
            })
        }

        fn can_transform(&self, _: &str, _: &str, _: TimeQuery) -> Result<(), TransformError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_failure_after_successful_wait() {
        let store = FlakyStore {
            lookups: Cell::new(0),
        };
        let err = quick()
            .resolve(&store, "map", "cam", TimeQuery::Latest)
            .expect_err("lookup fails");
        assert!(matches!(err, ResolveError::TransformLookup { .. }));
        assert_eq!(store.lookups.get(), 1);
    }
}
