//! Insert and remove, with automatic subdivision and merging.

use web_time::Instant;

use super::tree::elapsed_us;
use super::{NodeId, Octree, OctreeNode};
use crate::constants::OCTANT_COUNT;
use crate::error::OctreeError;
use crate::events::{EventData, OctreeEventKind};
use crate::types::Point3D;

/// Outcome of a single insert.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertResult {
  /// The point was stored.
  pub success: bool,
  /// Nodes touched on the way down (0 when validation failed).
  pub nodes_visited: usize,
  /// Why the insert failed.
  pub error: Option<OctreeError>,
}

impl InsertResult {
  fn stored(nodes_visited: usize) -> Self {
    Self {
      success: true,
      nodes_visited,
      error: None,
    }
  }

  fn rejected(error: OctreeError) -> Self {
    Self {
      success: false,
      nodes_visited: 0,
      error: Some(error),
    }
  }
}

/// Outcome of a single remove.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoveResult<T> {
  /// A matching point was found and removed.
  pub success: bool,
  /// Nodes touched on the way down.
  pub nodes_visited: usize,
  /// The removed point, payload included.
  pub removed: Option<Point3D<T>>,
  /// Why nothing was removed.
  pub error: Option<OctreeError>,
}

impl<T> RemoveResult<T> {
  fn failed(nodes_visited: usize, error: OctreeError) -> Self {
    Self {
      success: false,
      nodes_visited,
      removed: None,
      error: Some(error),
    }
  }
}

/// Outcome of [`Octree::insert_batch`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchInsertResult {
  /// Points stored.
  pub successful: usize,
  /// Points rejected.
  pub failed: usize,
  /// Messages of the rejections, in input order.
  pub errors: Vec<String>,
  /// Per-point results, in input order.
  pub results: Vec<InsertResult>,
}

impl<T: Clone> Octree<T> {
  /// Insert a point.
  ///
  /// Rejects non-finite coordinates and points outside the root bounds.
  /// Otherwise the point always lands in exactly one leaf; a full leaf above
  /// the depth ceiling is split first. Duplicates are stored.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::insert"))]
  pub fn insert(&mut self, point: Point3D<T>) -> InsertResult {
    let start = Instant::now();
    let result = self.insert_checked(point);
    self.record(|m| m.record_insert(elapsed_us(start)));
    result
  }

  /// Insert points in order.
  ///
  /// Failures do not abort the batch.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::insert_batch"))]
  pub fn insert_batch(&mut self, points: impl IntoIterator<Item = Point3D<T>>) -> BatchInsertResult {
    let mut batch = BatchInsertResult::default();
    for point in points {
      let result = self.insert(point);
      if result.success {
        batch.successful += 1;
      } else {
        batch.failed += 1;
        if let Some(err) = &result.error {
          batch.errors.push(err.to_string());
        }
      }
      batch.results.push(result);
    }
    tracing::debug!(
      successful = batch.successful,
      failed = batch.failed,
      "batch insert finished"
    );
    batch
  }

  /// Remove one point matching `point`'s position (payload ignored).
  ///
  /// When the emptied leaf's siblings are all empty leaves too and
  /// `auto_merge` is set, the parent collapses back into a leaf.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "octree::remove"))]
  pub fn remove<U>(&mut self, point: &Point3D<U>) -> RemoveResult<T> {
    let start = Instant::now();
    let result = self.remove_checked(point);
    self.record(|m| m.record_remove(elapsed_us(start)));
    result
  }

  fn insert_checked(&mut self, point: Point3D<T>) -> InsertResult {
    if !point.is_finite() {
      return InsertResult::rejected(OctreeError::InvalidPoint(point.position));
    }
    if !self.bounds.contains_point(point.position) {
      return InsertResult::rejected(OctreeError::OutOfBounds {
        point: point.position,
        min: self.bounds.min,
        max: self.bounds.max,
      });
    }

    let echo = self.events_enabled().then(|| point.clone());
    let position = point.position;
    let visited = self.insert_from(NodeId::ROOT, point);
    self.total_points += 1;
    tracing::trace!(%position, visited, "point inserted");

    if let Some(point) = echo {
      self.emit(OctreeEventKind::PointInserted, || EventData::Point(point));
    }
    InsertResult::stored(visited)
  }

  /// Place `point` in the subtree rooted at `start`. Returns nodes visited.
  fn insert_from(&mut self, start: NodeId, point: Point3D<T>) -> usize {
    let mut id = start;
    let mut visited = 0;
    loop {
      visited += 1;
      let node = &self.nodes[id];
      if node.is_leaf() {
        if !self.config.should_subdivide(node.depth, node.points.len()) {
          self.nodes[id].points.push(point);
          return visited;
        }
        self.subdivide(id);
      }

      let node = &self.nodes[id];
      match node.children {
        Some(children) => id = children[node.bounds.octant_of(point.position)],
        None => {
          self.nodes[id].points.push(point);
          return visited;
        }
      }
    }
  }

  /// Split a leaf into 8 children and push its points down.
  fn subdivide(&mut self, id: NodeId) {
    let (bounds, depth) = {
      let node = &self.nodes[id];
      (node.bounds, node.depth)
    };
    let child_depth = depth + 1;
    let lod = self.config.lod_for_depth(child_depth);

    let nodes = &mut self.nodes;
    let children: [NodeId; 8] = std::array::from_fn(|octant| {
      nodes.alloc(OctreeNode::new_leaf(
        bounds.octant(octant),
        child_depth,
        Some(id),
        lod,
      ))
    });
    let parent = &mut self.nodes[id];
    parent.children = Some(children);
    let points = std::mem::take(&mut parent.points);
    self.leaf_count += OCTANT_COUNT - 1;

    tracing::debug!(?id, depth, points = points.len(), "node subdivided");
    self.emit(OctreeEventKind::NodeSubdivided, || EventData::Node { id, depth, bounds });

    for point in points {
      self.insert_from(id, point);
    }
  }

  fn remove_checked<U>(&mut self, point: &Point3D<U>) -> RemoveResult<T> {
    if !point.is_finite() {
      return RemoveResult::failed(0, OctreeError::InvalidPoint(point.position));
    }

    let (found, visited) = self.find_match(point);
    let Some((leaf, index)) = found else {
      return RemoveResult::failed(visited, OctreeError::NotFound(point.position));
    };
    let node = &mut self.nodes[leaf];
    let removed = node.points.remove(index);
    let emptied = node.points.is_empty();
    let parent = node.parent;
    self.total_points -= 1;
    tracing::trace!(position = %removed.position, visited, "point removed");

    if self.events_enabled() {
      let echo = removed.clone();
      self.emit(OctreeEventKind::PointRemoved, || EventData::Point(echo));
    }

    if emptied && self.config.auto_merge {
      if let Some(parent) = parent {
        self.merge(parent);
      }
    }

    RemoveResult {
      success: true,
      nodes_visited: visited,
      removed: Some(removed),
      error: None,
    }
  }

  /// Collapse `id` into a leaf if all 8 children are empty leaves.
  ///
  /// With `cascade_merge` the check repeats up the parent chain.
  fn merge(&mut self, id: NodeId) {
    let mut current = Some(id);
    while let Some(id) = current {
      let node = &self.nodes[id];
      let Some(children) = node.children else {
        return;
      };
      if !children.iter().all(|c| self.nodes[*c].is_empty_leaf()) {
        return;
      }

      for child in children {
        self.nodes.free(child);
      }
      let node = &mut self.nodes[id];
      node.children = None;
      let (depth, bounds, parent) = (node.depth, node.bounds, node.parent);
      self.leaf_count -= OCTANT_COUNT - 1;

      tracing::debug!(?id, depth, "node merged");
      self.emit(OctreeEventKind::NodeMerged, || EventData::Node { id, depth, bounds });

      if !self.config.cascade_merge {
        return;
      }
      current = parent;
    }
  }
}

#[cfg(test)]
#[path = "mutation_test.rs"]
mod mutation_test;
