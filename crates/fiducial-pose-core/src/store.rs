//! Shared store of named, timestamped rigid transforms.
//!
//! [`TransformStore`] is the seam the pipeline talks to: it broadcasts the
//! transforms it computes and reads back the ones other publishers provide.
//! [`TransformBuffer`] is an in-process implementation that keeps a short
//! history per edge of the frame tree.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::geometry::{interpolate, RigidTransform};
use crate::msgs::TransformStamped;
use crate::time::{Time, TimeQuery};

/// Failures of a frame-tree query.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("frame name must not be empty")]
    EmptyFrameName,
    #[error("frame \"{0}\" does not exist in the tree")]
    UnknownFrame(String),
    #[error("frames \"{target}\" and \"{source_frame}\" are not connected")]
    Disconnected { target: String, source_frame: String },
    #[error("no data for \"{parent}\" -> \"{child}\" at {requested:.3}s (history {oldest:.3}s..{newest:.3}s)")]
    Extrapolation {
        parent: String,
        child: String,
        requested: f64,
        oldest: f64,
        newest: f64,
    },
}

/// Process-wide transform tree.
///
/// Implementations synchronize internally; every method takes `&self`.
pub trait TransformStore {
    /// Append one named transform (`header.frame_id` is the parent).
    fn publish(&self, transform: &TransformStamped);

    /// Transform mapping points in `source` into `target`.
    fn lookup(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<RigidTransform, TransformError>;

    fn can_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<(), TransformError> {
        self.lookup(target, source, time).map(|_| ())
    }

    /// Block until `can_transform` succeeds or `timeout` elapses, checking every `poll`.
    ///
    /// On timeout the error of the last attempt is returned.
    fn wait_for_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
        timeout: Duration,
        poll: Duration,
    ) -> Result<(), TransformError> {
        let started = Instant::now();
        loop {
            match self.can_transform(target, source, time) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        return Err(err);
                    }
                    std::thread::sleep(poll.min(timeout - elapsed));
                }
            }
        }
    }
}

impl<S: TransformStore + ?Sized> TransformStore for std::sync::Arc<S> {
    fn publish(&self, transform: &TransformStamped) {
        (**self).publish(transform)
    }

    fn lookup(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<RigidTransform, TransformError> {
        (**self).lookup(target, source, time)
    }

    fn can_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<(), TransformError> {
        (**self).can_transform(target, source, time)
    }

    fn wait_for_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
        timeout: Duration,
        poll: Duration,
    ) -> Result<(), TransformError> {
        (**self).wait_for_transform(target, source, time, timeout, poll)
    }
}

#[derive(Clone, Debug)]
struct Edge {
    parent: String,
    /// Sorted by stamp, ascending.
    samples: Vec<(Time, RigidTransform)>,
}

impl Edge {
    fn insert(&mut self, stamp: Time, transform: RigidTransform) {
        let idx = self.samples.partition_point(|(t, _)| *t <= stamp);
        if idx > 0 && self.samples[idx - 1].0 == stamp {
            self.samples[idx - 1].1 = transform;
        } else {
            self.samples.insert(idx, (stamp, transform));
        }
    }

    fn prune(&mut self, window: Duration) {
        let Some((newest, _)) = self.samples.last() else {
            return;
        };
        let cutoff = newest.saturating_sub(window);
        let keep_from = self.samples.partition_point(|(t, _)| *t < cutoff);
        // Always keep one sample so the edge stays resolvable.
        let keep_from = keep_from.min(self.samples.len() - 1);
        self.samples.drain(..keep_from);
    }

    /// Parent-from-child transform at `time`.
    fn sample(&self, child: &str, time: TimeQuery) -> Result<RigidTransform, TransformError> {
        let (first, last) = match (self.samples.first(), self.samples.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(TransformError::UnknownFrame(child.to_string())),
        };
        let stamp = match time {
            TimeQuery::Latest => return Ok(last.1),
            TimeQuery::At(stamp) => stamp,
        };
        if self.samples.len() == 1 && first.0 == Time::ZERO {
            // Stamp zero marks a static edge, valid at every time.
            return Ok(first.1);
        }
        if stamp < first.0 || stamp > last.0 {
            return Err(TransformError::Extrapolation {
                parent: self.parent.clone(),
                child: child.to_string(),
                requested: stamp.as_secs_f64(),
                oldest: first.0.as_secs_f64(),
                newest: last.0.as_secs_f64(),
            });
        }
        let idx = self.samples.partition_point(|(t, _)| *t < stamp);
        let (t1, x1) = self.samples[idx];
        if t1 == stamp || idx == 0 {
            return Ok(x1);
        }
        let (t0, x0) = self.samples[idx - 1];
        let span = t1.secs_since(t0);
        let alpha = if span > 0.0 { stamp.secs_since(t0) / span } else { 1.0 };
        Ok(interpolate(&x0, &x1, alpha))
    }
}

/// In-memory frame tree with bounded per-edge history.
///
/// Each child frame has exactly one parent; publishing a transform with a
/// different parent for an existing child re-parents it and drops the old
/// history.
pub struct TransformBuffer {
    edges: RwLock<HashMap<String, Edge>>,
    cache_window: Duration,
}

impl Default for TransformBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CACHE_WINDOW)
    }
}

impl TransformBuffer {
    pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_secs(10);

    pub fn new(cache_window: Duration) -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
            cache_window,
        }
    }

    /// Names of all frames currently in the tree.
    pub fn frames(&self) -> Vec<String> {
        let edges = self.edges.read();
        let mut names: Vec<String> = edges
            .iter()
            .flat_map(|(child, edge)| [child.clone(), edge.parent.clone()])
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn is_known(edges: &HashMap<String, Edge>, frame: &str) -> bool {
        edges.contains_key(frame) || edges.values().any(|e| e.parent == frame)
    }

    /// Walk from `frame` to its root, collecting `ancestor <- frame` transforms.
    fn chain_to_root(
        edges: &HashMap<String, Edge>,
        frame: &str,
        time: TimeQuery,
    ) -> Result<Vec<(String, RigidTransform)>, TransformError> {
        let mut chain = vec![(frame.to_string(), RigidTransform::identity())];
        let mut current = frame.to_string();
        let mut acc = RigidTransform::identity();
        while let Some(edge) = edges.get(&current) {
            acc = edge.sample(&current, time)? * acc;
            if chain.iter().any(|(name, _)| *name == edge.parent) {
                // Cycle guard; a well-formed tree never gets here.
                break;
            }
            chain.push((edge.parent.clone(), acc));
            current = edge.parent.clone();
        }
        Ok(chain)
    }
}

impl TransformStore for TransformBuffer {
    fn publish(&self, transform: &TransformStamped) {
        let parent = &transform.header.frame_id;
        let child = &transform.child_frame_id;
        if parent.is_empty() || child.is_empty() || parent == child {
            log::warn!(
                "ignoring transform with invalid frames \"{}\" -> \"{}\"",
                parent,
                child
            );
            return;
        }
        let mut edges = self.edges.write();
        let edge = edges.entry(child.clone()).or_insert_with(|| Edge {
            parent: parent.clone(),
            samples: Vec::new(),
        });
        if edge.parent != *parent {
            log::debug!(
                "re-parenting \"{}\" from \"{}\" to \"{}\"",
                child,
                edge.parent,
                parent
            );
            edge.parent = parent.clone();
            edge.samples.clear();
        }
        edge.insert(transform.header.stamp, transform.rigid());
        edge.prune(self.cache_window);
    }

    fn lookup(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<RigidTransform, TransformError> {
        if target.is_empty() || source.is_empty() {
            return Err(TransformError::EmptyFrameName);
        }
        let edges = self.edges.read();
        for frame in [target, source] {
            if !Self::is_known(&edges, frame) {
                return Err(TransformError::UnknownFrame(frame.to_string()));
            }
        }
        if target == source {
            return Ok(RigidTransform::identity());
        }

        let source_chain = Self::chain_to_root(&edges, source, time)?;
        let target_chain = Self::chain_to_root(&edges, target, time)?;

        for (ancestor, ancestor_from_target) in &target_chain {
            if let Some((_, ancestor_from_source)) =
                source_chain.iter().find(|(name, _)| name == ancestor)
            {
                return Ok(ancestor_from_target.inverse() * ancestor_from_source);
            }
        }
        Err(TransformError::Disconnected {
            target: target.to_string(),
            source_frame: source.to_string(),
        })
    }
}
