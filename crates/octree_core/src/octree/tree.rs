//! Octree - the public facade tying storage, configuration, events and
//! metrics together.
//!
//! Mutation lives in [`mutation`](super::mutation), queries in
//! [`query`](super::query); this module owns the state they share.

use std::cell::RefCell;
use std::fmt;

use smallvec::SmallVec;
use web_time::Instant;

use super::{Bounds3D, NodeArena, NodeId, OctreeConfig, OctreeNode};
use crate::constants::POINT_EPSILON;
use crate::events::{EventBus, EventData, HandlerId, OctreeEvent, OctreeEventKind};
use crate::metrics::PerformanceMetrics;
use crate::types::Point3D;

/// Point octree over a fixed root region.
///
/// Generic over the point payload `T`. The tree exclusively owns every node;
/// it is single-threaded and not re-entrant.
pub struct Octree<T = ()> {
  pub(super) bounds: Bounds3D,
  pub(super) config: OctreeConfig,
  pub(super) nodes: NodeArena<T>,
  pub(super) total_points: usize,
  pub(super) leaf_count: usize,
  pub(super) events: EventBus<T>,
  pub(super) metrics: RefCell<PerformanceMetrics>,
}

impl<T> Octree<T> {
  /// Create an empty tree covering `bounds`.
  pub fn new(bounds: Bounds3D, config: OctreeConfig) -> Self {
    let root = OctreeNode::new_leaf(bounds, 0, None, config.lod_for_depth(0));
    Self {
      bounds,
      config,
      nodes: NodeArena::with_root(root),
      total_points: 0,
      leaf_count: 1,
      events: EventBus::new(),
      metrics: RefCell::new(PerformanceMetrics::new()),
    }
  }

  /// Root region.
  #[inline]
  pub fn bounds(&self) -> &Bounds3D {
    &self.bounds
  }

  /// Active configuration.
  #[inline]
  pub fn config(&self) -> &OctreeConfig {
    &self.config
  }

  /// Replace the configuration.
  ///
  /// New values apply to subsequent operations; existing nodes are neither
  /// split nor merged to match.
  pub fn set_config(&mut self, config: OctreeConfig) {
    self.config = config;
  }

  /// Number of stored points.
  #[inline]
  pub fn size(&self) -> usize {
    self.total_points
  }

  /// Check if no point is stored.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.total_points == 0
  }

  /// Number of live nodes (internal and leaf).
  #[inline]
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Number of leaves.
  #[inline]
  pub fn leaf_count(&self) -> usize {
    self.leaf_count
  }

  /// Drop every point and node, leaving a single empty root.
  ///
  /// Configuration, handlers and metrics are kept.
  pub fn clear(&mut self) {
    let root = OctreeNode::new_leaf(self.bounds, 0, None, self.config.lod_for_depth(0));
    self.nodes.reset(root);
    self.total_points = 0;
    self.leaf_count = 1;
    tracing::debug!("octree cleared");
  }

  /// The root node.
  pub fn root(&self) -> &OctreeNode<T> {
    &self.nodes[NodeId::ROOT]
  }

  /// Look up a node by id.
  pub fn node(&self, id: NodeId) -> Option<&OctreeNode<T>> {
    self.nodes.get(id)
  }

  /// Register an event handler.
  ///
  /// Handlers only fire while [`OctreeConfig::emit_events`] is set.
  pub fn add_event_handler(&mut self, handler: impl Fn(&OctreeEvent<T>) + 'static) -> HandlerId {
    self.events.add(handler)
  }

  /// Unregister an event handler. Returns false if it was not registered.
  pub fn remove_event_handler(&mut self, id: HandlerId) -> bool {
    self.events.remove(id)
  }

  /// Snapshot of the operation counters and latencies.
  pub fn performance_metrics(&self) -> PerformanceMetrics {
    self.metrics.borrow().clone()
  }

  /// Zero all counters and latencies.
  pub fn reset_metrics(&self) {
    self.metrics.borrow_mut().reset();
  }

  /// Iterate over every stored point, depth-first in octant order.
  pub fn iter(&self) -> Points<'_, T> {
    let mut stack = SmallVec::new();
    stack.push(NodeId::ROOT);
    Points {
      nodes: &self.nodes,
      stack,
      current: Default::default(),
    }
  }

  /// Check if a point with the same position is stored.
  pub fn contains<U>(&self, point: &Point3D<U>) -> bool {
    point.is_finite() && self.find_match(point).0.is_some()
  }

  /// Verify every structural invariant, reporting the first violation.
  ///
  /// Checks leaf/internal exclusivity, parent links, octant bounds, depth and
  /// bucket limits, point containment and the cached counters.
  pub fn check_invariants(&self) -> Result<(), String> {
    let root = self.root();
    if root.parent.is_some() || root.depth != 0 || root.bounds != self.bounds {
      return Err("root node is malformed".to_string());
    }

    let mut reachable = 0usize;
    let mut leaves = 0usize;
    let mut points = 0usize;
    let mut stack = vec![NodeId::ROOT];
    while let Some(id) = stack.pop() {
      let node = self
        .nodes
        .get(id)
        .ok_or_else(|| format!("{:?} is referenced but not live", id))?;
      reachable += 1;
      points += node.points.len();

      if node.depth > self.config.max_depth {
        return Err(format!("{:?} at depth {} exceeds max depth", id, node.depth));
      }
      if let Some(p) = node.points.iter().find(|p| !node.bounds.contains_point(p.position)) {
        return Err(format!("{:?} stores {} outside its bounds", id, p.position));
      }

      match node.children {
        None => {
          leaves += 1;
          if node.points.len() > self.config.max_points
            && self.config.auto_subdivide
            && node.depth < self.config.max_depth
          {
            return Err(format!(
              "{:?} holds {} points above depth ceiling",
              id,
              node.points.len()
            ));
          }
        }
        Some(children) => {
          if !node.points.is_empty() {
            return Err(format!("internal {:?} stores points", id));
          }
          for (octant, child_id) in children.iter().enumerate() {
            let child = self
              .nodes
              .get(*child_id)
              .ok_or_else(|| format!("{:?} has dangling child {:?}", id, child_id))?;
            if child.parent != Some(id) {
              return Err(format!("{:?} has wrong parent link", child_id));
            }
            if child.depth != node.depth + 1 {
              return Err(format!("{:?} has wrong depth", child_id));
            }
            if child.bounds != node.bounds.octant(octant) {
              return Err(format!("{:?} bounds do not match octant {}", child_id, octant));
            }
            stack.push(*child_id);
          }
        }
      }
    }

    if reachable != self.nodes.len() {
      return Err(format!(
        "{} nodes reachable but {} live",
        reachable,
        self.nodes.len()
      ));
    }
    if leaves != self.leaf_count {
      return Err(format!("leaf count {} != cached {}", leaves, self.leaf_count));
    }
    if points != self.total_points {
      return Err(format!("point count {} != cached {}", points, self.total_points));
    }
    Ok(())
  }

  /// Locate a stored point at `point`'s position within [`POINT_EPSILON`].
  ///
  /// Every node whose bounds, grown by the epsilon, hold the query is
  /// searched, so a match just across a split plane is still found. Returns
  /// the leaf and slot of the first match plus the number of nodes visited.
  pub(super) fn find_match<U>(&self, point: &Point3D<U>) -> (Option<(NodeId, usize)>, usize) {
    let mut visited = 0;
    let mut stack: SmallVec<[NodeId; 32]> = SmallVec::new();
    stack.push(NodeId::ROOT);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      if !node.bounds.inflate(POINT_EPSILON).contains_point(point.position) {
        continue;
      }
      visited += 1;
      match node.children {
        Some(children) => stack.extend(children.iter().rev().copied()),
        None => {
          if let Some(index) = node.points.iter().position(|p| p.same_position(point)) {
            return (Some((id, index)), visited);
          }
        }
      }
    }
    (None, visited)
  }

  /// Points stored in the subtree rooted at `id`.
  pub(super) fn subtree_point_count(&self, id: NodeId) -> usize {
    let mut count = 0;
    let mut stack: SmallVec<[NodeId; 32]> = SmallVec::new();
    stack.push(id);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      count += node.points.len();
      if let Some(children) = node.children {
        stack.extend_from_slice(&children);
      }
    }
    count
  }

  #[inline]
  pub(super) fn events_enabled(&self) -> bool {
    self.config.emit_events && !self.events.is_empty()
  }

  pub(super) fn emit(&self, kind: OctreeEventKind, data: impl FnOnce() -> EventData<T>) {
    if self.config.emit_events {
      self.events.emit(kind, data);
    }
  }

  pub(super) fn record(&self, f: impl FnOnce(&mut PerformanceMetrics)) {
    if self.config.collect_metrics {
      f(&mut self.metrics.borrow_mut());
    }
  }
}

impl<T: Clone> Octree<T> {
  /// Create a tree and insert `points` in order.
  ///
  /// Points that fail validation are skipped (and logged at debug level).
  pub fn with_points(
    bounds: Bounds3D,
    config: OctreeConfig,
    points: impl IntoIterator<Item = Point3D<T>>,
  ) -> Self {
    let mut tree = Self::new(bounds, config);
    let batch = tree.insert_batch(points);
    if batch.failed > 0 {
      tracing::debug!(failed = batch.failed, "initial points rejected");
    }
    tree
  }
}

impl<T> fmt::Debug for Octree<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Octree")
      .field("bounds", &self.bounds)
      .field("config", &self.config)
      .field("points", &self.total_points)
      .field("nodes", &self.nodes.len())
      .field("leaves", &self.leaf_count)
      .field("events", &self.events)
      .finish()
  }
}

impl<'a, T> IntoIterator for &'a Octree<T> {
  type Item = &'a Point3D<T>;
  type IntoIter = Points<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

/// Depth-first iterator over stored points.
pub struct Points<'a, T> {
  nodes: &'a NodeArena<T>,
  stack: SmallVec<[NodeId; 32]>,
  current: std::slice::Iter<'a, Point3D<T>>,
}

impl<'a, T> Iterator for Points<'a, T> {
  type Item = &'a Point3D<T>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(p) = self.current.next() {
        return Some(p);
      }
      let id = self.stack.pop()?;
      let node = &self.nodes[id];
      if let Some(children) = node.children {
        // Reverse so octant 0 is visited first
        self.stack.extend(children.iter().rev().copied());
      }
      self.current = node.points.iter();
    }
  }
}

/// Microseconds elapsed since `start`.
#[inline]
pub(super) fn elapsed_us(start: Instant) -> u64 {
  start.elapsed().as_micros() as u64
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
